// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger-file watcher: the fallback inbox consumer.
//!
//! Watches `triggers/` for writes; each file is one role's inbox. On
//! change, valid lines are injected into the role's pane via the direct
//! daemon path (this *is* the fallback, so no delivery verification loop),
//! then the file is cleared. Invalid lines leave the file untouched for
//! operator inspection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind as NotifyEventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use troupe_core::{
    Clock, CorrelationId, EventKind, EventSource, LedgerEvent, Role, Target,
};
use troupe_engine::PaneHost;
use troupe_storage::LedgerWriterHandle;

use troupe_engine::delivery::fallback;

/// Consume one trigger file: inject its lines, then clear it.
///
/// Returns the number of injected lines, or `None` when the file did not
/// parse (left in place).
pub async fn consume_trigger<H: PaneHost, C: Clock>(
    host: &Arc<H>,
    ledger: &LedgerWriterHandle,
    clock: &C,
    path: &Path,
) -> Option<usize> {
    let role_name = path.file_stem()?.to_str()?.to_string();
    let target: Target = role_name.parse().ok()?;

    let lines = match fallback::read_trigger(path) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "trigger file rejected");
            return None;
        }
    };
    if lines.is_empty() {
        return Some(0);
    }

    let roles: Vec<Role> = match target {
        Target::Role(role) => vec![role],
        // Group inbox files fan out to every member.
        group => {
            let mut members = group.resolve(Role::Coordinator);
            if let Target::All = group {
                members.push(Role::Coordinator);
            }
            members
        }
    };

    let mut injected = 0;
    for line in &lines {
        for role in &roles {
            let pane = match role.default_pane() {
                Some(pane) => pane,
                None => continue,
            };
            let payload = format!("{line}\n");
            let write = host
                .write(pane, &payload, troupe_daemon::protocol::WriteMode::Chunked, None)
                .await;
            match write {
                Ok((status, _)) if status.is_accepted() => {
                    let _ = host.send_trusted_enter(pane).await;
                    injected += 1;
                }
                Ok((status, _)) => {
                    debug!(pane = %pane, ?status, "trigger injection rejected");
                }
                Err(e) => {
                    warn!(pane = %pane, error = %e, "trigger injection failed");
                }
            }
        }
        let event = LedgerEvent::new(
            EventKind::TriggerConsumed,
            EventSource::Watcher,
            CorrelationId::new(),
        )
        .with_payload(serde_json::json!({"file": role_name, "line_len": line.len()}))
        .at(clock.epoch_ms());
        if let Err(e) = ledger.append(event).await {
            warn!(error = %e, "trigger event append failed");
        }
    }

    // Cleared after a successful injection attempt.
    if let Err(e) = fallback::clear_trigger(path) {
        warn!(path = %path.display(), error = %e, "trigger clear failed");
    }
    Some(injected)
}

/// Watch the triggers directory and consume files as they change.
pub fn spawn_trigger_watcher<H: PaneHost, C: Clock + 'static>(
    host: Arc<H>,
    ledger: LedgerWriterHandle,
    clock: C,
    triggers_dir: PathBuf,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = std::fs::create_dir_all(&triggers_dir) {
            warn!(error = %e, "triggers dir unavailable");
            return;
        }
        let (tx, mut rx) = mpsc::channel::<PathBuf>(64);

        // Bridge the notify callback into the async world.
        let mut watcher = match notify::recommended_watcher(move |result: Result<Event, _>| {
            if let Ok(event) = result {
                if matches!(event.kind, NotifyEventKind::Create(_) | NotifyEventKind::Modify(_)) {
                    for path in event.paths {
                        if path.extension().map(|e| e == "txt").unwrap_or(false) {
                            let _ = tx.blocking_send(path);
                        }
                    }
                }
            }
        }) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(error = %e, "trigger watcher init failed");
                return;
            }
        };
        if let Err(e) = watcher.watch(&triggers_dir, RecursiveMode::NonRecursive) {
            warn!(error = %e, "trigger watch failed");
            return;
        }
        info!(dir = %triggers_dir.display(), "trigger watcher running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                path = rx.recv() => match path {
                    Some(path) => {
                        // Rename lands as create+modify; consuming twice is
                        // harmless because the file is cleared after the
                        // first pass.
                        let _ = consume_trigger(&host, &ledger, &clock, &path).await;
                    }
                    None => break,
                },
            }
        }
    })
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
