// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for control-channel I/O.
//!
//! Accepts connections and handles them in spawned tasks without blocking
//! pane loops. A connection carries pipelined request/response frames and,
//! after a `subscribe`, interleaved event frames pushed by a forwarding
//! task. Forwarding is back-pressured: a slow subscriber gets a counted
//! dropped-frames summary instead of blocking data delivery.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use troupe_core::PaneSpec;

use crate::env::ipc_timeout;
use crate::pane::{PaneRegistry, SpawnError};
use crate::protocol::{
    self, DaemonEvent, EventFrame, Request, RequestFrame, Response, ResponseFrame,
    SubscribeChannel,
};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub registry: Arc<PaneRegistry>,
    pub shutdown: Arc<Notify>,
}

/// Listener accepting control-channel connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Accept until shutdown, one task per connection.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx, cancel).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("accept error: {}", e),
                },
            }
        }
    }
}

fn log_connection_error(e: protocol::ProtocolError) {
    match e {
        protocol::ProtocolError::ConnectionClosed => debug!("client disconnected"),
        protocol::ProtocolError::Timeout => debug!("connection timeout"),
        _ => error!("connection error: {}", e),
    }
}

/// Handle one client connection until it closes.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    ctx: Arc<ListenCtx>,
    cancel: CancellationToken,
) -> Result<(), protocol::ProtocolError> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer = Arc::new(Mutex::new(write_half));
    let forwarder: CancellationToken = cancel.child_token();

    loop {
        let frame: RequestFrame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = protocol::read_frame_unbounded(&mut reader) => match frame {
                Ok(frame) => frame,
                Err(protocol::ProtocolError::ConnectionClosed) => break,
                Err(e) => {
                    forwarder.cancel();
                    return Err(e);
                }
            },
        };

        debug!(request = ?frame.request, "received request");
        let response = match frame.request {
            Request::Subscribe { channels, raw } => {
                spawn_forwarder(&ctx, Arc::clone(&writer), channels, raw, forwarder.clone());
                Response::Subscribed
            }
            request => handle_request(request, &ctx).await,
        };

        let response = ResponseFrame { id: frame.id, response };
        let mut writer = writer.lock().await;
        protocol::write_frame(&mut *writer, &response, ipc_timeout()).await?;
        writer.flush().await?;
    }

    forwarder.cancel();
    Ok(())
}

/// Handle one request and produce its response.
async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Spawn {
            pane_id,
            role,
            command,
            env,
            geometry,
            scrollback_bytes,
            restart_on_dead,
        } => {
            let spec = PaneSpec {
                pane_id,
                role,
                command,
                env,
                geometry,
                scrollback_bytes: scrollback_bytes.unwrap_or(256 * 1024),
            };
            match ctx.registry.spawn(spec, restart_on_dead) {
                Ok(pid) => Response::Spawned { pane_id, pid },
                Err(SpawnError::AlreadySpawned(id)) => {
                    Response::error("already_spawned", format!("pane {id} is already running"))
                }
                Err(SpawnError::ExecFailed(e)) => Response::error("exec_failed", e.to_string()),
            }
        }

        Request::Write { pane_id, data, mode, window } => {
            let (status, acked_bytes) = ctx.registry.write(pane_id, &data, mode, window).await;
            Response::WriteAck { status, acked_bytes }
        }

        Request::Resize { pane_id, cols, rows } => match ctx.registry.resize(pane_id, cols, rows) {
            Ok(()) => Response::ResizeAck { pane_id, cols, rows },
            Err(status) => Response::error("resize_rejected", format!("{status:?}")),
        },

        Request::Kill { pane_id, signal: _, reason } => {
            if ctx.registry.kill(pane_id, reason.as_deref().unwrap_or("requested")) {
                Response::Killed { pane_id }
            } else {
                Response::error("terminal_missing", format!("pane {pane_id} not found"))
            }
        }

        Request::SendTrustedEnter { pane_id } => {
            let outcome = ctx.registry.send_trusted_enter(pane_id).await;
            Response::EnterResult { outcome }
        }

        Request::Status => Response::Status { panes: ctx.registry.snapshot() },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        // Intercepted in handle_connection.
        Request::Subscribe { .. } => Response::Subscribed,
    }
}

/// Forward daemon events matching the subscription to the connection.
fn spawn_forwarder(
    ctx: &ListenCtx,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    channels: Vec<SubscribeChannel>,
    raw: bool,
    cancel: CancellationToken,
) {
    let mut events = ctx.registry.subscribe();
    tokio::spawn(async move {
        let mut dropped: u64 = 0;
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            let mut event = match event {
                Ok(event) => event,
                Err(RecvError::Lagged(n)) => {
                    dropped += n;
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !subscribed(&event, &channels) {
                continue;
            }
            // Raw bytes ride only on explicit request.
            if let DaemonEvent::PtyData { bytes, .. } = &mut event {
                if !raw {
                    *bytes = None;
                }
            }

            if dropped > 0 {
                let summary = EventFrame(DaemonEvent::Meta { dropped });
                let mut w = writer.lock().await;
                if protocol::write_frame(&mut *w, &summary, ipc_timeout()).await.is_err() {
                    break;
                }
                dropped = 0;
            }
            let frame = EventFrame(event);
            let mut w = writer.lock().await;
            if protocol::write_frame(&mut *w, &frame, ipc_timeout()).await.is_err() {
                break;
            }
            if w.flush().await.is_err() {
                break;
            }
        }
        info!("subscriber disconnected");
    });
}

fn subscribed(event: &DaemonEvent, channels: &[SubscribeChannel]) -> bool {
    let needed = match event {
        DaemonEvent::PtyData { .. } => SubscribeChannel::Data,
        DaemonEvent::PtyUp { .. }
        | DaemonEvent::PtyDown { .. }
        | DaemonEvent::PtyResizeAck { .. } => SubscribeChannel::Lifecycle,
        DaemonEvent::PaneHealth { .. } => SubscribeChannel::Health,
        DaemonEvent::Meta { .. } => return true,
    };
    channels.contains(&needed)
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
