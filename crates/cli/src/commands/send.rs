// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `troupe send <targetRole> "<body>"` — the messaging utility.
//!
//! Primary path is the broker websocket; when the broker is unreachable
//! the trigger-file fallback is written directly. The printed outcome is
//! authoritative: nothing claims delivery it cannot substantiate.

use std::path::Path;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use troupe_broker::{BrokerRequest, BrokerResponse};
use troupe_core::{DeliveryOutcome, MessageEnvelope, MessageId, PriorityTag, Role, SessionId, Target};
use troupe_engine::delivery::fallback;

use super::Paths;
use crate::exit_error::{exit_code_for, ExitError};

pub async fn run(
    workspace: &Path,
    target: &str,
    body: &str,
    from: &str,
    seq: u64,
    priority: &str,
) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let target_parsed: Target = target
        .parse()
        .map_err(|_| ExitError::invalid_input(format!("unknown target {target:?}")))?;
    let from_role: Role = from
        .parse()
        .map_err(|_| ExitError::invalid_input(format!("unknown role {from:?}")))?;
    let priority: PriorityTag = serde_json::from_value(serde_json::Value::String(
        priority.to_string(),
    ))
    .map_err(|_| ExitError::invalid_input(format!("unknown priority {priority:?}")))?;
    if body.trim().is_empty() {
        return Err(ExitError::invalid_input("empty message body"));
    }
    if seq == 0 {
        return Err(ExitError::invalid_input("sequence numbers start at 1"));
    }

    match send_via_broker(&paths, target, body, from, seq, priority).await {
        Ok(outcome) => finish(&outcome),
        Err(_) => {
            // Broker unreachable: write the trigger inbox directly.
            let roles = target_parsed.resolve(from_role);
            if roles.is_empty() {
                return Err(ExitError::invalid_input("target resolves to nobody"));
            }
            let envelope = MessageEnvelope {
                message_id: MessageId::new(),
                from_role,
                target: target_parsed,
                body: body.to_string(),
                priority,
                sequence_number: seq,
                sender_session: session_id(),
                created_at_ms: now_ms(),
            };
            let triggers = std::path::absolute(&paths.triggers)
                .map_err(|e| ExitError::failure(e.to_string()))?;
            for role in roles {
                fallback::write_trigger(&triggers, role, &envelope)
                    .map_err(|e| ExitError::failure(e.to_string()))?;
            }
            finish("fallback.triggered")
        }
    }
}

async fn send_via_broker(
    paths: &Paths,
    target: &str,
    body: &str,
    from: &str,
    seq: u64,
    priority: PriorityTag,
) -> Result<String, ExitError> {
    let secret = std::env::var(troupe_core::env::COMMS_SECRET)
        .ok()
        .or_else(|| std::fs::read_to_string(&paths.secret).ok().map(|s| s.trim().to_string()))
        .ok_or_else(|| ExitError::failure("no comms secret"))?;
    let port = super::broker_port(paths);
    let url = format!("ws://127.0.0.1:{port}");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|e| ExitError::failure(format!("broker unreachable: {e}")))?;

    let register = BrokerRequest::Register {
        device_id: format!("cli-{}", std::process::id()),
        role: from.to_string(),
        secret,
    };
    send_frame(&mut ws, &register).await?;
    match recv_frame(&mut ws).await? {
        BrokerResponse::RegisterAck { ok: true, .. } => {}
        BrokerResponse::Error { kind, message } => {
            return Err(ExitError::failure(format!("{kind}: {message}")))
        }
        other => return Err(ExitError::failure(format!("unexpected ack: {other:?}"))),
    }

    let send = BrokerRequest::Send {
        message_id: Some(MessageId::new()),
        from_role: from.to_string(),
        target_role: target.to_string(),
        body: body.to_string(),
        sequence: seq,
        priority,
        metadata: Default::default(),
    };
    send_frame(&mut ws, &send).await?;
    match recv_frame(&mut ws).await? {
        BrokerResponse::Ack { outcome, .. } => Ok(outcome),
        BrokerResponse::Error { kind, message } => {
            Err(ExitError::failure(format!("{kind}: {message}")))
        }
        other => Err(ExitError::failure(format!("unexpected ack: {other:?}"))),
    }
}

/// Print the authoritative outcome line and set the exit code.
fn finish(outcome: &str) -> Result<(), ExitError> {
    let parsed = DeliveryOutcome::from(outcome.to_string());
    match parsed {
        DeliveryOutcome::DeliveredVerified => println!("Delivered (verified)"),
        DeliveryOutcome::DeliveredRisked => println!("Delivered (risked — weak evidence)"),
        DeliveryOutcome::AcceptedUnverified => println!("Accepted — target did not acknowledge"),
        DeliveryOutcome::FallbackTriggered => println!("Queued — trigger fallback"),
        DeliveryOutcome::Dropped(reason) => println!("Dropped ({})", reason.as_str()),
    }
    let code = exit_code_for(&parsed);
    if code == 0 {
        Ok(())
    } else {
        Err(ExitError { code, message: format!("delivery outcome: {outcome}") })
    }
}

async fn send_frame<S>(ws: &mut S, request: &BrokerRequest) -> Result<(), ExitError>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(request).map_err(|e| ExitError::failure(e.to_string()))?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| ExitError::failure(e.to_string()))
}

async fn recv_frame<S>(ws: &mut S) -> Result<BrokerResponse, ExitError>
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text)
                    .map_err(|e| ExitError::failure(format!("bad broker frame: {e}")));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ExitError::failure("broker closed the connection"))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ExitError::failure(e.to_string())),
        }
    }
}

fn session_id() -> SessionId {
    SessionId::new()
}

fn now_ms() -> u64 {
    use troupe_core::Clock;
    troupe_core::SystemClock.epoch_ms()
}
