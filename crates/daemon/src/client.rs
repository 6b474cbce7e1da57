// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async client for the daemon control channel.
//!
//! One connection per concern: request/response traffic multiplexes by id
//! on a single connection; subscriptions open their own connection so a
//! slow event stream never delays a response.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Mutex};

use crate::env::ipc_timeout;
use crate::protocol::{
    read_frame, read_frame_unbounded, write_frame, DaemonEvent, EventFrame, ProtocolError,
    Request, RequestFrame, Response, ResponseFrame, SubscribeChannel,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon unreachable at {0}")]
    Unreachable(PathBuf),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon replied with mismatched id (expected {expected}, got {got})")]
    IdMismatch { expected: u64, got: u64 },
}

/// Client over the daemon's UNIX socket.
pub struct DaemonClient {
    socket_path: PathBuf,
    connection: Mutex<Connection>,
    next_id: AtomicU64,
}

struct Connection {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl DaemonClient {
    /// Connect to a running daemon.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|_| ClientError::Unreachable(socket_path.to_path_buf()))?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            connection: Mutex::new(Connection {
                reader: BufReader::new(read_half),
                writer: write_half,
            }),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one request and await its response.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = RequestFrame { id, request };
        let mut conn = self.connection.lock().await;
        write_frame(&mut conn.writer, &frame, ipc_timeout()).await?;
        let response: ResponseFrame = read_frame(&mut conn.reader, ipc_timeout()).await?;
        if response.id != id {
            return Err(ClientError::IdMismatch { expected: id, got: response.id });
        }
        Ok(response.response)
    }

    /// Open a dedicated subscription connection; events arrive on the
    /// returned channel until the daemon closes or the receiver drops.
    pub async fn subscribe(
        &self,
        channels: Vec<SubscribeChannel>,
        raw: bool,
    ) -> Result<mpsc::Receiver<DaemonEvent>, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| ClientError::Unreachable(self.socket_path.clone()))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let frame = RequestFrame { id: 0, request: Request::Subscribe { channels, raw } };
        write_frame(&mut write_half, &frame, ipc_timeout()).await?;
        let ack: ResponseFrame = read_frame(&mut reader, ipc_timeout()).await?;
        if !matches!(ack.response, Response::Subscribed) {
            return Err(ClientError::Protocol(ProtocolError::ConnectionClosed));
        }

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            // Keep the write half alive: dropping it closes the stream.
            let _write_half = write_half;
            loop {
                let frame: Result<EventFrame, _> = read_frame_unbounded(&mut reader).await;
                match frame {
                    Ok(EventFrame(event)) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Ok(rx)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}
