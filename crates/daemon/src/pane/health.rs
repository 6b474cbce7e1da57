// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane health monitor: idle clocks and failed-write streaks drive the
//! cascade dead → stuck → stale → healthy, and the restart policy.
//!
//! Background-owned synthetic panes are skipped: they are not user-visible
//! panes and their recovery belongs to the background worker manager.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use troupe_core::{PaneHealth, PaneState};

use super::pty::is_process_alive;
use super::PaneRegistry;
use crate::protocol::DaemonEvent;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// No output for this long: stale.
const STALE_AFTER_MS: u64 = 30_000;
/// Stale plus a failed-write streak at least this long: stuck.
const STUCK_WRITE_STREAK: u64 = 3;

/// Spawn the monitor task.
pub fn spawn_health_monitor(
    registry: Arc<PaneRegistry>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            sweep(&registry);
        }
    })
}

/// Classify one pane from its vitals.
pub fn classify(process_alive: bool, idle_ms: u64, failed_writes: u64) -> PaneHealth {
    if !process_alive {
        PaneHealth::Dead
    } else if idle_ms > STALE_AFTER_MS && failed_writes >= STUCK_WRITE_STREAK {
        PaneHealth::Stuck
    } else if idle_ms > STALE_AFTER_MS {
        PaneHealth::Stale
    } else {
        PaneHealth::Healthy
    }
}

fn sweep(registry: &Arc<PaneRegistry>) {
    let now_ms = registry.now_ms();
    for (pane_id, state, _health, pid, activity, restart, spec) in registry.monitor_rows() {
        if pane_id.is_background() {
            continue;
        }

        let process_alive = state.is_alive() && is_process_alive(pid);
        let idle_ms = now_ms.saturating_sub(activity.last_output_ms.load(Ordering::Relaxed));
        let failed_writes = activity.failed_writes.load(Ordering::Relaxed);
        let next = classify(process_alive, idle_ms, failed_writes);

        if registry.mark_health(pane_id, next) {
            info!(pane = %pane_id, status = ?next, "pane health changed");
            registry.emit(DaemonEvent::PaneHealth { pane_id, status: next });
        }

        if next == PaneHealth::Dead && state == PaneState::Dead && restart {
            info!(pane = %pane_id, "auto-restarting dead pane");
            if let Err(e) = registry.spawn(spec, restart) {
                warn!(pane = %pane_id, error = %e, "auto-restart failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
