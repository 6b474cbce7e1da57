// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane ownership: registry, per-pane tasks, PTY backend, health monitor.
//!
//! The daemon exclusively owns every PTY file descriptor. Each pane runs
//! one event loop (input writer, output demux, lifecycle); cross-pane work
//! is independent. The registry is the only shared structure, guarded by a
//! short-critical-section mutex that is never held across I/O.

mod health;
mod nbio;
mod pty;
mod task;

pub use health::{classify, spawn_health_monitor};
pub use pty::{is_process_alive, ExitStatus, NativePty, PtyError};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use troupe_core::{Clock, PaneHealth, PaneId, PaneSpec, PaneState, SystemClock};

use crate::protocol::{DaemonEvent, EnterOutcome, WriteMode, WriteStatus};

/// Identical interactive writes inside this window are ghosts.
const GHOST_DEDUP_WINDOW: Duration = Duration::from_millis(150);
/// Chunk size for flow-controlled writes.
const DEFAULT_CHUNK_BYTES: usize = 512;
/// How long trusted-enter watches for effect.
const ENTER_VERIFY_WINDOW: Duration = Duration::from_millis(250);
/// Broadcast capacity for daemon events.
const EVENT_CAPACITY: usize = 1024;

/// Live counters a pane task maintains; the monitor and status read them.
#[derive(Debug, Default)]
pub struct PaneActivity {
    pub last_output_ms: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub failed_writes: AtomicU64,
}

/// Input commands delivered to a pane task.
pub(crate) struct InputCmd {
    pub data: Vec<u8>,
    pub reply: oneshot::Sender<std::io::Result<()>>,
}

/// One registered pane.
pub struct PaneHandle {
    pub spec: PaneSpec,
    pub pid: u32,
    pub state: PaneState,
    pub health: PaneHealth,
    pub restart_on_dead: bool,
    pub activity: Arc<PaneActivity>,
    pub(crate) input_tx: mpsc::Sender<InputCmd>,
    pub cancel: CancellationToken,
    /// Last interactive write fingerprint for ghost dedup.
    last_interactive: Option<(u64, Instant)>,
}

/// Typed spawn failures surfaced to the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("pane {0} already spawned")]
    AlreadySpawned(PaneId),

    #[error("exec failed: {0}")]
    ExecFailed(#[from] PtyError),
}

/// Registry of live panes plus the daemon-wide event hub.
pub struct PaneRegistry {
    panes: Mutex<HashMap<PaneId, PaneHandle>>,
    events: broadcast::Sender<DaemonEvent>,
    clock: SystemClock,
}

impl PaneRegistry {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self { panes: Mutex::new(HashMap::new()), events, clock: SystemClock })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: DaemonEvent) {
        let _ = self.events.send(event);
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Spawn a pane's child process and start its event loop.
    pub fn spawn(
        self: &Arc<Self>,
        spec: PaneSpec,
        restart_on_dead: bool,
    ) -> Result<u32, SpawnError> {
        {
            let panes = self.panes.lock();
            if panes.get(&spec.pane_id).map(|h| h.state.is_alive()).unwrap_or(false) {
                return Err(SpawnError::AlreadySpawned(spec.pane_id));
            }
        }
        let pty = NativePty::spawn(&spec)?;
        let pid = pty.child_pid();
        let activity = Arc::new(PaneActivity::default());
        activity.last_output_ms.store(self.now_ms(), Ordering::Relaxed);
        let (input_tx, input_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let handle = PaneHandle {
            spec: spec.clone(),
            pid,
            state: PaneState::Starting,
            health: PaneHealth::Healthy,
            restart_on_dead,
            activity: Arc::clone(&activity),
            input_tx,
            cancel: cancel.clone(),
            last_interactive: None,
        };
        self.panes.lock().insert(spec.pane_id, handle);

        let registry = Arc::clone(self);
        tokio::spawn(task::run_pane(registry, spec.pane_id, pty, input_rx, activity, cancel));

        info!(pane = %spec.pane_id, pid, "pane spawned");
        self.emit(DaemonEvent::PtyUp { pane_id: spec.pane_id, pid });
        Ok(pid)
    }

    /// Write to a pane with mode semantics. Never silently succeeds.
    pub async fn write(
        self: &Arc<Self>,
        pane_id: PaneId,
        data: &str,
        mode: WriteMode,
        window: Option<usize>,
    ) -> (WriteStatus, usize) {
        let input_tx = {
            let mut panes = self.panes.lock();
            let handle = match panes.get_mut(&pane_id) {
                Some(handle) => handle,
                None => return (WriteStatus::RejectedTerminalMissing, 0),
            };
            if !handle.state.is_alive() {
                return (WriteStatus::RejectedNotAlive, 0);
            }
            if mode == WriteMode::Interactive {
                let hash = fingerprint(data.as_bytes());
                let now = Instant::now();
                if let Some((last_hash, at)) = handle.last_interactive {
                    if last_hash == hash && now.duration_since(at) < GHOST_DEDUP_WINDOW {
                        return (WriteStatus::BlockedGhostDedup, 0);
                    }
                }
                handle.last_interactive = Some((hash, now));
            }
            handle.input_tx.clone()
        };

        let bytes = data.as_bytes();
        let chunk = match mode {
            WriteMode::Chunked => window.unwrap_or(DEFAULT_CHUNK_BYTES).max(1),
            _ => bytes.len().max(1),
        };

        let mut acked = 0usize;
        for part in bytes.chunks(chunk) {
            let (reply_tx, reply_rx) = oneshot::channel();
            let cmd = InputCmd { data: part.to_vec(), reply: reply_tx };
            if input_tx.send(cmd).await.is_err() {
                self.note_failed_write(pane_id);
                return (WriteStatus::RejectedNotAlive, acked);
            }
            match reply_rx.await {
                Ok(Ok(())) => acked += part.len(),
                Ok(Err(e)) => {
                    warn!(pane = %pane_id, error = %e, "pane write failed");
                    self.note_failed_write(pane_id);
                    return (WriteStatus::Error, acked);
                }
                Err(_) => {
                    self.note_failed_write(pane_id);
                    return (WriteStatus::RejectedNotAlive, acked);
                }
            }
        }
        (WriteStatus::Accepted, acked)
    }

    fn note_failed_write(&self, pane_id: PaneId) {
        if let Some(handle) = self.panes.lock().get(&pane_id) {
            handle.activity.failed_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Dispatch a synthetic submit and watch for effect briefly.
    pub async fn send_trusted_enter(self: &Arc<Self>, pane_id: PaneId) -> EnterOutcome {
        let mut events = self.subscribe();
        let (status, _) = self.write(pane_id, "\r", WriteMode::Raw, None).await;
        if !status.is_accepted() {
            return EnterOutcome::Rejected;
        }
        let deadline = tokio::time::sleep(ENTER_VERIFY_WINDOW);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return EnterOutcome::SubmittedQuiet,
                event = events.recv() => match event {
                    Ok(DaemonEvent::PtyData { pane_id: p, .. }) if p == pane_id => {
                        return EnterOutcome::SubmittedActive;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return EnterOutcome::SubmittedQuiet;
                    }
                },
            }
        }
    }

    /// Resize, coalescing with any pending resize for the pane.
    pub fn resize(&self, pane_id: PaneId, cols: u16, rows: u16) -> Result<(), WriteStatus> {
        let mut panes = self.panes.lock();
        let handle = panes.get_mut(&pane_id).ok_or(WriteStatus::RejectedTerminalMissing)?;
        if !handle.state.is_alive() {
            return Err(WriteStatus::RejectedNotAlive);
        }
        handle.spec.geometry = troupe_core::PaneGeometry { cols, rows };
        // The pane task applies the latest geometry on its next tick; stale
        // intermediate sizes are skipped (coalescing).
        self.emit(DaemonEvent::PtyResizeAck { pane_id, cols, rows });
        Ok(())
    }

    /// Request termination: graceful cancel, then the task escalates.
    pub fn kill(&self, pane_id: PaneId, reason: &str) -> bool {
        let panes = self.panes.lock();
        match panes.get(&pane_id) {
            Some(handle) => {
                info!(pane = %pane_id, reason, "pane kill requested");
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn mark_state(&self, pane_id: PaneId, state: PaneState) {
        if let Some(handle) = self.panes.lock().get_mut(&pane_id) {
            handle.state = state;
        }
    }

    pub fn mark_health(&self, pane_id: PaneId, health: PaneHealth) -> bool {
        let mut panes = self.panes.lock();
        match panes.get_mut(&pane_id) {
            Some(handle) if handle.health != health => {
                handle.health = health;
                true
            }
            _ => false,
        }
    }

    pub fn get_state(&self, pane_id: PaneId) -> Option<PaneState> {
        self.panes.lock().get(&pane_id).map(|h| h.state)
    }

    pub fn pending_geometry(&self, pane_id: PaneId) -> Option<troupe_core::PaneGeometry> {
        self.panes.lock().get(&pane_id).map(|h| h.spec.geometry)
    }

    /// Snapshot for status responses and the health monitor.
    pub fn snapshot(&self) -> Vec<crate::protocol::PaneStatusEntry> {
        self.panes
            .lock()
            .values()
            .map(|handle| crate::protocol::PaneStatusEntry {
                pane_id: handle.spec.pane_id,
                role: handle.spec.role,
                state: handle.state,
                health: handle.health,
                pid: handle.state.is_alive().then_some(handle.pid),
                bytes_read: handle.activity.bytes_read.load(Ordering::Relaxed),
                bytes_written: handle.activity.bytes_written.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Monitor view: (pane, state, health, pid, activity, restart, spec).
    pub(crate) fn monitor_rows(
        &self,
    ) -> Vec<(PaneId, PaneState, PaneHealth, u32, Arc<PaneActivity>, bool, PaneSpec)> {
        self.panes
            .lock()
            .values()
            .map(|h| {
                (
                    h.spec.pane_id,
                    h.state,
                    h.health,
                    h.pid,
                    Arc::clone(&h.activity),
                    h.restart_on_dead,
                    h.spec.clone(),
                )
            })
            .collect()
    }

    /// Cancel every pane (shutdown).
    pub fn kill_all(&self, reason: &str) {
        for handle in self.panes.lock().values() {
            info!(pane = %handle.spec.pane_id, reason, "pane teardown");
            handle.cancel.cancel();
        }
    }
}

fn fingerprint(data: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[path = "pane_tests.rs"]
mod tests;
