// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background worker surface, via the broker (coordinator-only).

use std::path::Path;

use clap::Subcommand;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use troupe_broker::{BackgroundAction, BrokerRequest, BrokerResponse};

use super::Paths;
use crate::exit_error::ExitError;

#[derive(Subcommand)]
pub enum BgCommand {
    /// Spawn a background worker with a task prompt.
    Spawn {
        task_prompt: String,
        #[arg(long)]
        slot: Option<u8>,
    },
    /// List live workers.
    Ls,
    /// Kill one worker by alias.
    Kill {
        target: String,
        #[arg(long, default_value = "operator request")]
        reason: String,
    },
    /// Kill every worker.
    KillAll {
        #[arg(long, default_value = "operator request")]
        reason: String,
    },
}

pub async fn run(workspace: &Path, command: BgCommand) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let request = match command {
        BgCommand::Spawn { task_prompt, slot } => BrokerRequest::BackgroundAgent {
            action: BackgroundAction::Spawn,
            slot,
            task_prompt: Some(task_prompt),
            target: None,
            reason: None,
        },
        BgCommand::Ls => BrokerRequest::BackgroundAgent {
            action: BackgroundAction::List,
            slot: None,
            task_prompt: None,
            target: None,
            reason: None,
        },
        BgCommand::Kill { target, reason } => BrokerRequest::BackgroundAgent {
            action: BackgroundAction::Kill,
            slot: None,
            task_prompt: None,
            target: Some(target),
            reason: Some(reason),
        },
        BgCommand::KillAll { reason } => BrokerRequest::BackgroundAgent {
            action: BackgroundAction::KillAll,
            slot: None,
            task_prompt: None,
            target: None,
            reason: Some(reason),
        },
    };

    let response = roundtrip(&paths, request).await?;
    match response {
        BrokerResponse::BackgroundAck { ok: true, alias: Some(alias), .. } => {
            println!("{alias}");
            Ok(())
        }
        BrokerResponse::BackgroundAck { ok: true, workers, .. } => {
            for worker in workers {
                println!("{worker}");
            }
            Ok(())
        }
        BrokerResponse::BackgroundAck { ok: false, error, .. } => Err(ExitError::failure(
            error.unwrap_or_else(|| "background operation failed".to_string()),
        )),
        BrokerResponse::Error { kind, message } => {
            Err(ExitError::failure(format!("{kind}: {message}")))
        }
        other => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
    }
}

async fn roundtrip(paths: &Paths, request: BrokerRequest) -> Result<BrokerResponse, ExitError> {
    let secret = std::env::var(troupe_core::env::COMMS_SECRET)
        .ok()
        .or_else(|| std::fs::read_to_string(&paths.secret).ok().map(|s| s.trim().to_string()))
        .ok_or_else(|| ExitError::failure("no comms secret"))?;
    let port = super::broker_port(paths);
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .map_err(|e| ExitError::failure(format!("broker unreachable: {e}")))?;

    let register = BrokerRequest::Register {
        device_id: format!("cli-{}", std::process::id()),
        role: "coordinator".to_string(),
        secret,
    };
    let text = serde_json::to_string(&register).map_err(|e| ExitError::failure(e.to_string()))?;
    ws.send(Message::Text(text.into())).await.map_err(|e| ExitError::failure(e.to_string()))?;
    read_response(&mut ws).await?;

    let text = serde_json::to_string(&request).map_err(|e| ExitError::failure(e.to_string()))?;
    ws.send(Message::Text(text.into())).await.map_err(|e| ExitError::failure(e.to_string()))?;
    read_response(&mut ws).await
}

async fn read_response<S>(ws: &mut S) -> Result<BrokerResponse, ExitError>
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text)
                    .map_err(|e| ExitError::failure(format!("bad broker frame: {e}")))
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ExitError::failure("broker closed the connection"))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ExitError::failure(e.to_string())),
        }
    }
}
