// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: singleton lock, socket setup, logging, teardown.
//!
//! The daemon is an OS-level singleton per workspace: an advisory file lock
//! guards the socket. PTYs keep running across client disconnects; new
//! clients re-attach and subscribe from current state. Shutdown tears down
//! panes, removes the socket, and releases the lock.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::env;
use crate::listener::{ListenCtx, Listener};
use crate::pane::{spawn_health_monitor, PaneRegistry};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("another daemon already holds {0}")]
    AlreadyRunning(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Guard holding the singleton lock for the daemon's lifetime.
pub struct LockGuard {
    file: File,
}

impl LockGuard {
    /// Take the advisory lock, failing fast when another daemon holds it.
    pub fn acquire(workspace: &Path) -> Result<Self, DaemonError> {
        let path = env::lock_path(workspace);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| DaemonError::AlreadyRunning(path.display().to_string()))?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Run the daemon until a shutdown request.
///
/// Post-conditions: the socket file is removed, every pane has been torn
/// down (SIGHUP then SIGKILL via PTY drop), and the lock is released.
pub async fn run(workspace: &Path) -> Result<(), DaemonError> {
    let _lock = LockGuard::acquire(workspace)?;

    let socket = env::socket_path(workspace);
    // A stale socket from a crashed daemon would block bind.
    if socket.exists() {
        std::fs::remove_file(&socket)?;
    }
    let unix = UnixListener::bind(&socket)?;
    info!(socket = %socket.display(), "daemon listening");

    let registry = PaneRegistry::new();
    let shutdown = Arc::new(Notify::new());
    let cancel = CancellationToken::new();

    let monitor = spawn_health_monitor(Arc::clone(&registry), cancel.clone());
    let ctx = Arc::new(ListenCtx { registry: Arc::clone(&registry), shutdown: Arc::clone(&shutdown) });
    let listener = tokio::spawn(Listener::new(unix, ctx).run(cancel.clone()));

    shutdown.notified().await;
    info!("daemon shutting down");

    registry.kill_all("daemon shutdown");
    cancel.cancel();
    let _ = monitor.await;
    listener.abort();
    let _ = std::fs::remove_file(&socket);
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
