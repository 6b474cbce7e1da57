// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker: loopback websocket bus for role-addressed messaging.
//!
//! Clients register with the shared secret, then exchange JSON frames.
//! Sends are handed to the delivery engine and answered with the delivery
//! taxonomy; background-agent operations are restricted to the
//! coordinator; sends from background aliases to anyone but their parent
//! are refused before they reach delivery.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use troupe_core::{Clock, MessageEnvelope, MessageId, PaneHealth, Role, SessionId, Target};
use troupe_engine::background::BackgroundError;
use troupe_engine::{BackgroundManager, DeliveryEngine, PaneHost};

use crate::auth;
use crate::frames::{BackgroundAction, BrokerRequest, BrokerResponse, HealthStatus};
use crate::routes::{parse_registrant, Registrant, RoleRoutes};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A registered client's connection context.
#[derive(Debug)]
pub struct ClientCtx {
    pub registrant: Registrant,
    pub session: SessionId,
}

/// The broker service.
pub struct Broker<H: PaneHost, C: Clock> {
    delivery: Arc<DeliveryEngine<H, C>>,
    background: Arc<BackgroundManager<H, C>>,
    host: Arc<H>,
    routes: Arc<RoleRoutes>,
    secret: String,
    clock: C,
}

impl<H: PaneHost, C: Clock + 'static> Broker<H, C> {
    pub fn new(
        delivery: Arc<DeliveryEngine<H, C>>,
        background: Arc<BackgroundManager<H, C>>,
        host: Arc<H>,
        secret: String,
        clock: C,
    ) -> Arc<Self> {
        Arc::new(Self {
            delivery,
            background,
            host,
            routes: Arc::new(RoleRoutes::new()),
            secret,
            clock,
        })
    }

    pub fn routes(&self) -> Arc<RoleRoutes> {
        Arc::clone(&self.routes)
    }

    /// Accept websocket connections until cancelled.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), BrokerError> {
        info!(addr = ?listener.local_addr().ok(), "broker listening");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let broker = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = broker.handle_socket(stream).await {
                                debug!(error = %e, "broker connection ended");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "broker accept failed"),
                },
            }
        }
    }

    async fn handle_socket(self: Arc<Self>, stream: TcpStream) -> Result<(), BrokerError> {
        let mut ws = tokio_tungstenite::accept_async(stream).await?;

        // First frame must be a register carrying the shared secret.
        let ctx = loop {
            let frame = match ws.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            };
            let request: BrokerRequest = match serde_json::from_str(&frame) {
                Ok(request) => request,
                Err(_) => {
                    send_json(&mut ws, &BrokerResponse::error("invalid_payload", "bad frame"))
                        .await?;
                    continue;
                }
            };
            match self.register(request) {
                Ok((ctx, ack)) => {
                    send_json(&mut ws, &ack).await?;
                    break ctx;
                }
                Err(response) => {
                    send_json(&mut ws, &response).await?;
                    return Ok(());
                }
            }
        };
        let name = registrant_name(&ctx.registrant);

        // Registered: serve frames until close.
        while let Some(frame) = ws.next().await {
            let frame = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    self.routes.unregister(&name);
                    return Err(e.into());
                }
            };
            let response = match serde_json::from_str::<BrokerRequest>(&frame) {
                Ok(request) => self.handle_request(&ctx, request).await,
                Err(_) => BrokerResponse::error("invalid_payload", "bad frame"),
            };
            send_json(&mut ws, &response).await?;
        }
        self.routes.unregister(&name);
        Ok(())
    }

    /// Validate a registration frame.
    pub fn register(
        &self,
        request: BrokerRequest,
    ) -> Result<(ClientCtx, BrokerResponse), BrokerResponse> {
        let (role, secret) = match request {
            BrokerRequest::Register { role, secret, .. } => (role, secret),
            _ => {
                return Err(BrokerResponse::error(
                    "auth_failed",
                    "connection must start with register",
                ))
            }
        };
        if !auth::verify(&self.secret, &secret) {
            return Err(BrokerResponse::error("auth_failed", "bad secret"));
        }
        let registrant = parse_registrant(&role)
            .ok_or_else(|| BrokerResponse::error("owner_binding_violation", "unknown role"))?;
        let name = registrant_name(&registrant);
        self.routes.register(&name, registrant.clone());
        let ack = BrokerResponse::RegisterAck {
            ok: true,
            role: name,
            connected_roles: self.routes.connected_names(),
        };
        Ok((ClientCtx { registrant, session: SessionId::new() }, ack))
    }

    /// Handle one post-registration frame.
    pub async fn handle_request(&self, ctx: &ClientCtx, request: BrokerRequest) -> BrokerResponse {
        match request {
            BrokerRequest::Register { .. } => {
                BrokerResponse::error("invalid_payload", "already registered")
            }
            BrokerRequest::Send { message_id, from_role: _, target_role, body, sequence, priority, metadata: _ } => {
                self.handle_send(ctx, message_id, &target_role, body, sequence, priority).await
            }
            BrokerRequest::HealthCheck { target } => self.handle_health(&target).await,
            BrokerRequest::BackgroundAgent { action, slot, task_prompt, target, reason } => {
                self.handle_background(ctx, action, slot, task_prompt, target, reason).await
            }
        }
    }

    async fn handle_send(
        &self,
        ctx: &ClientCtx,
        message_id: Option<MessageId>,
        target_role: &str,
        body: String,
        sequence: u64,
        priority: troupe_core::PriorityTag,
    ) -> BrokerResponse {
        let target = match self.routes.resolve_target(target_role) {
            Some(target) => target,
            None => {
                return BrokerResponse::Ack {
                    message_id: message_id.unwrap_or_default(),
                    outcome: "dropped.invalid_target".to_string(),
                    reason: Some("unknown target".to_string()),
                }
            }
        };

        // The sender's announced identity wins over the frame's from_role.
        let from_role = match &ctx.registrant {
            Registrant::Role(role) => *role,
            Registrant::BackgroundAlias { alias, parent } => {
                // Background workers may only address their parent.
                let allowed = matches!(target, Target::Role(role) if role == *parent);
                if !allowed {
                    return BrokerResponse::error(
                        "owner_binding_violation",
                        format!("{alias} may only send to {parent}"),
                    );
                }
                if let Err(BackgroundError::OwnerBindingViolation) = self
                    .background
                    .check_send(alias, target.as_role().unwrap_or(*parent))
                {
                    return BrokerResponse::error(
                        "owner_binding_violation",
                        format!("{alias} may only send to {parent}"),
                    );
                }
                match parent.default_pane() {
                    Some(parent_pane) => {
                        background_role_for(alias, parent_pane).unwrap_or(Role::Coordinator)
                    }
                    None => Role::Coordinator,
                }
            }
        };

        let envelope = MessageEnvelope {
            message_id: message_id.unwrap_or_default(),
            from_role,
            target,
            body,
            priority,
            sequence_number: sequence,
            sender_session: ctx.session,
            created_at_ms: self.clock.epoch_ms(),
        };
        let report = self.delivery.deliver(envelope).await;
        BrokerResponse::Ack {
            message_id: report.message_id,
            outcome: report.outcome.to_string(),
            reason: None,
        }
    }

    async fn handle_health(&self, target: &str) -> BrokerResponse {
        let resolved = match self.routes.resolve_target(target) {
            Some(target) => target,
            None => return BrokerResponse::Health { status: HealthStatus::InvalidTarget },
        };
        let roles = match resolved {
            Target::Role(role) => vec![role],
            group => group.resolve(Role::Coordinator),
        };
        let status = self.host.status().await.unwrap_or_default();
        let mut worst = HealthStatus::Healthy;
        for role in roles {
            if !self.routes.is_connected_role(role) {
                return BrokerResponse::Health { status: HealthStatus::NoRoute };
            }
            let pane_health = role
                .default_pane()
                .and_then(|pane| status.iter().find(|p| p.pane_id == pane))
                .map(|p| p.health);
            match pane_health {
                Some(PaneHealth::Healthy) => {}
                _ => worst = HealthStatus::Stale,
            }
        }
        BrokerResponse::Health { status: worst }
    }

    async fn handle_background(
        &self,
        ctx: &ClientCtx,
        action: BackgroundAction,
        slot: Option<u8>,
        task_prompt: Option<String>,
        target: Option<String>,
        reason: Option<String>,
    ) -> BrokerResponse {
        // Coordinator only.
        if !matches!(ctx.registrant, Registrant::Role(Role::Coordinator)) {
            return BrokerResponse::error(
                "owner_binding_violation",
                "background-agent is coordinator-only",
            );
        }
        let caller = Role::Coordinator;
        match action {
            BackgroundAction::Spawn => {
                let prompt = task_prompt.unwrap_or_default();
                match self.background.spawn(caller, slot, &prompt).await {
                    Ok(info) => BrokerResponse::BackgroundAck {
                        ok: true,
                        alias: Some(info.alias),
                        workers: Vec::new(),
                        target_map: Default::default(),
                        error: None,
                    },
                    Err(e) => background_error(e),
                }
            }
            BackgroundAction::List => match self.background.list(caller) {
                Ok(workers) => BrokerResponse::BackgroundAck {
                    ok: true,
                    alias: None,
                    workers: workers.into_iter().map(|w| w.alias).collect(),
                    target_map: Default::default(),
                    error: None,
                },
                Err(e) => background_error(e),
            },
            BackgroundAction::Kill => {
                let target = target.unwrap_or_default();
                match self
                    .background
                    .kill(caller, &target, reason.as_deref().unwrap_or("requested"))
                    .await
                {
                    Ok(()) => BrokerResponse::BackgroundAck {
                        ok: true,
                        alias: Some(target),
                        workers: Vec::new(),
                        target_map: Default::default(),
                        error: None,
                    },
                    Err(e) => background_error(e),
                }
            }
            BackgroundAction::KillAll => {
                match self
                    .background
                    .kill_all(caller, reason.as_deref().unwrap_or("requested"))
                    .await
                {
                    Ok(count) => BrokerResponse::BackgroundAck {
                        ok: true,
                        alias: None,
                        workers: vec![count.to_string()],
                        target_map: Default::default(),
                        error: None,
                    },
                    Err(e) => background_error(e),
                }
            }
            BackgroundAction::TargetMap => match self.background.target_map(caller) {
                Ok(map) => BrokerResponse::BackgroundAck {
                    ok: true,
                    alias: None,
                    workers: Vec::new(),
                    target_map: map.into_iter().map(|(alias, pane)| (alias, pane.0)).collect(),
                    error: None,
                },
                Err(e) => background_error(e),
            },
        }
    }
}

fn background_error(e: BackgroundError) -> BrokerResponse {
    BrokerResponse::BackgroundAck {
        ok: false,
        alias: None,
        workers: Vec::new(),
        target_map: Default::default(),
        error: Some(e.kind().as_str().to_string()),
    }
}

fn registrant_name(registrant: &Registrant) -> String {
    match registrant {
        Registrant::Role(role) => role.to_string(),
        Registrant::BackgroundAlias { alias, .. } => alias.clone(),
    }
}

/// `builder-bg-0` plus the parent pane → the concrete background role.
fn background_role_for(alias: &str, parent_pane: troupe_core::PaneId) -> Option<Role> {
    let (_parent, slot) = alias.rsplit_once("-bg-")?;
    Some(Role::Background { parent: parent_pane, slot: slot.parse().ok()? })
}

async fn send_json<S>(ws: &mut S, response: &BrokerResponse) -> Result<(), BrokerError>
where
    S: SinkExt<Message> + Unpin,
    BrokerError: From<S::Error>,
{
    let text = serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string());
    ws.send(Message::Text(text.into())).await?;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
