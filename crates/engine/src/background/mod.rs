// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background worker manager: slot-based lifecycle for ephemeral helper
//! agents owned by one coordinator pane.
//!
//! Workers exist to run one task prompt and disappear. Only the parent
//! role may operate the slots, workers may only message their parent, and
//! the reaper collects them on completion sentinel, idle TTL, parent exit,
//! or shutdown. Their synthetic pane ids are suppressed from the UI health
//! pipeline by the daemon monitor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use troupe_core::{
    Clock, CorrelationId, ErrorKind, EventKind, EventSource, LedgerEvent, PaneGeometry, PaneId,
    PaneSpec, Role,
};
use troupe_storage::LedgerWriterHandle;

use crate::host::PaneHost;

/// Fixed slot count per parent pane.
pub const SLOT_COUNT: u8 = 3;
/// Reap a worker with no output for this long.
const IDLE_TTL: Duration = Duration::from_secs(20 * 60);
/// Reaper poll cadence.
const REAP_POLL: Duration = Duration::from_secs(15);
/// Token a worker prints to signal completion.
pub const COMPLETION_SENTINEL: &str = "[[troupe:bg:done]]";

#[derive(Debug, Error, PartialEq)]
pub enum BackgroundError {
    #[error("capacity_reached")]
    CapacityReached,

    #[error("slot_unavailable")]
    SlotUnavailable,

    #[error("owner_binding_violation")]
    OwnerBindingViolation,

    #[error("worker {0} not found")]
    NotFound(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),
}

impl BackgroundError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackgroundError::CapacityReached => ErrorKind::CapacityReached,
            BackgroundError::SlotUnavailable => ErrorKind::SlotUnavailable,
            BackgroundError::OwnerBindingViolation => ErrorKind::OwnerBindingViolation,
            BackgroundError::NotFound(_) => ErrorKind::Unknown,
            BackgroundError::SpawnFailed(_) => ErrorKind::ChildCrashed,
        }
    }
}

/// One live worker as reported by `list`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerInfo {
    pub slot: u8,
    pub pane_id: PaneId,
    pub alias: String,
    pub task_prompt: String,
    pub spawned_at_ms: u64,
}

struct WorkerEntry {
    info: WorkerInfo,
    last_activity_ms: u64,
}

/// Manager for one parent pane's background slots.
pub struct BackgroundManager<H: PaneHost, C: Clock> {
    host: Arc<H>,
    ledger: LedgerWriterHandle,
    clock: C,
    parent_pane: PaneId,
    parent_role: Role,
    /// Command template for worker agents (the parent's CLI, typically).
    worker_command: Vec<String>,
    slots: Mutex<HashMap<u8, WorkerEntry>>,
}

impl<H: PaneHost, C: Clock + 'static> BackgroundManager<H, C> {
    pub fn new(
        host: Arc<H>,
        ledger: LedgerWriterHandle,
        clock: C,
        parent_pane: PaneId,
        parent_role: Role,
        worker_command: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            ledger,
            clock,
            parent_pane,
            parent_role,
            worker_command,
            slots: Mutex::new(HashMap::new()),
        })
    }

    fn require_parent(&self, caller: Role) -> Result<(), BackgroundError> {
        if caller != self.parent_role {
            return Err(BackgroundError::OwnerBindingViolation);
        }
        Ok(())
    }

    /// Spawn a worker into the requested (or first free) slot.
    pub async fn spawn(
        self: &Arc<Self>,
        caller: Role,
        slot: Option<u8>,
        task_prompt: &str,
    ) -> Result<WorkerInfo, BackgroundError> {
        self.require_parent(caller)?;
        let now = self.clock.epoch_ms();

        let slot = {
            let slots = self.slots.lock();
            match slot {
                Some(wanted) => {
                    if wanted >= SLOT_COUNT {
                        return Err(BackgroundError::SlotUnavailable);
                    }
                    if slots.contains_key(&wanted) {
                        return Err(BackgroundError::SlotUnavailable);
                    }
                    wanted
                }
                None => (0..SLOT_COUNT)
                    .find(|s| !slots.contains_key(s))
                    .ok_or(BackgroundError::CapacityReached)?,
            }
        };

        let role = Role::Background { parent: self.parent_pane, slot };
        let pane_id = PaneId::background(self.parent_pane, slot);
        let alias = role
            .background_alias(self.parent_role)
            .unwrap_or_else(|| format!("bg-{slot}"));

        let mut env = HashMap::new();
        env.insert(
            troupe_core::env::PARENT_PANE_ID.to_string(),
            self.parent_pane.to_string(),
        );
        env.insert(troupe_core::env::BG_ALIAS.to_string(), alias.clone());
        let spec = PaneSpec {
            pane_id,
            role,
            command: self.worker_command.clone(),
            env,
            geometry: PaneGeometry::default(),
            scrollback_bytes: 64 * 1024,
        };
        self.host
            .spawn(spec, false)
            .await
            .map_err(|e| BackgroundError::SpawnFailed(e.to_string()))?;

        // Hand the worker its task and the completion contract.
        let briefing = format!(
            "{task_prompt}\nWhen the task is complete, print {COMPLETION_SENTINEL} on its own line."
        );
        if let Err(e) = self
            .host
            .write(pane_id, &briefing, troupe_daemon::protocol::WriteMode::Chunked, None)
            .await
        {
            warn!(pane = %pane_id, error = %e, "worker briefing write failed");
        }
        let _ = self.host.send_trusted_enter(pane_id).await;

        let info = WorkerInfo {
            slot,
            pane_id,
            alias: alias.clone(),
            task_prompt: task_prompt.to_string(),
            spawned_at_ms: now,
        };
        self.slots
            .lock()
            .insert(slot, WorkerEntry { info: info.clone(), last_activity_ms: now });

        info!(pane = %pane_id, alias, "background worker spawned");
        self.emit(EventKind::BackgroundSpawned, pane_id, serde_json::json!({"alias": alias}))
            .await;
        Ok(info)
    }

    pub fn list(&self, caller: Role) -> Result<Vec<WorkerInfo>, BackgroundError> {
        self.require_parent(caller)?;
        let mut workers: Vec<WorkerInfo> =
            self.slots.lock().values().map(|e| e.info.clone()).collect();
        workers.sort_by_key(|w| w.slot);
        Ok(workers)
    }

    /// Alias → pane id for every live worker.
    pub fn target_map(&self, caller: Role) -> Result<HashMap<String, PaneId>, BackgroundError> {
        self.require_parent(caller)?;
        Ok(self
            .slots
            .lock()
            .values()
            .map(|e| (e.info.alias.clone(), e.info.pane_id))
            .collect())
    }

    /// Kill one worker by alias or slot id.
    pub async fn kill(
        self: &Arc<Self>,
        caller: Role,
        target: &str,
        reason: &str,
    ) -> Result<(), BackgroundError> {
        self.require_parent(caller)?;
        let entry = {
            let slots = self.slots.lock();
            slots
                .values()
                .find(|e| {
                    e.info.alias == target || e.info.slot.to_string() == target
                })
                .map(|e| (e.info.slot, e.info.pane_id))
        };
        let (slot, pane_id) = entry.ok_or_else(|| BackgroundError::NotFound(target.to_string()))?;
        self.reap(slot, pane_id, reason).await;
        Ok(())
    }

    pub async fn kill_all(self: &Arc<Self>, caller: Role, reason: &str) -> Result<usize, BackgroundError> {
        self.require_parent(caller)?;
        let entries: Vec<(u8, PaneId)> = self
            .slots
            .lock()
            .values()
            .map(|e| (e.info.slot, e.info.pane_id))
            .collect();
        let count = entries.len();
        for (slot, pane_id) in entries {
            self.reap(slot, pane_id, reason).await;
        }
        Ok(count)
    }

    /// Broker guard: background workers may only send to their parent.
    pub fn check_send(&self, from_alias: &str, target: Role) -> Result<(), BackgroundError> {
        let is_ours = self.slots.lock().values().any(|e| e.info.alias == from_alias);
        if !is_ours {
            // Not one of our workers; nothing to enforce here.
            return Ok(());
        }
        if target != self.parent_role {
            return Err(BackgroundError::OwnerBindingViolation);
        }
        Ok(())
    }

    /// Note output from a worker pane: refreshes its idle clock and reaps
    /// on the completion sentinel.
    pub async fn observe_output(self: &Arc<Self>, pane_id: PaneId, text: &str) {
        let now = self.clock.epoch_ms();
        let entry = {
            let mut slots = self.slots.lock();
            let entry = slots.values_mut().find(|e| e.info.pane_id == pane_id);
            match entry {
                Some(entry) => {
                    entry.last_activity_ms = now;
                    text.contains(COMPLETION_SENTINEL).then_some(entry.info.slot)
                }
                None => None,
            }
        };
        if let Some(slot) = entry {
            self.reap(slot, pane_id, "completion_sentinel").await;
        }
    }

    async fn reap(self: &Arc<Self>, slot: u8, pane_id: PaneId, reason: &str) {
        if self.slots.lock().remove(&slot).is_none() {
            return;
        }
        info!(pane = %pane_id, slot, reason, "background worker reaped");
        if let Err(e) = self.host.kill(pane_id, reason).await {
            warn!(pane = %pane_id, error = %e, "worker kill failed");
        }
        self.emit(EventKind::BackgroundReaped, pane_id, serde_json::json!({"reason": reason}))
            .await;
    }

    async fn emit(&self, kind: EventKind, pane_id: PaneId, payload: serde_json::Value) {
        let event = LedgerEvent::new(kind, EventSource::Background, CorrelationId::new())
            .with_pane(pane_id)
            .with_payload(payload)
            .at(self.clock.epoch_ms());
        if let Err(e) = self.ledger.append(event).await {
            warn!(error = %e, "background ledger append failed");
        }
    }

    /// One reaper pass: idle TTL and parent liveness.
    pub async fn reap_pass(self: &Arc<Self>, parent_alive: bool) {
        let now = self.clock.epoch_ms();
        let expired: Vec<(u8, PaneId, &'static str)> = {
            let slots = self.slots.lock();
            slots
                .values()
                .filter_map(|e| {
                    if !parent_alive {
                        Some((e.info.slot, e.info.pane_id, "parent_exit"))
                    } else if now.saturating_sub(e.last_activity_ms) > IDLE_TTL.as_millis() as u64 {
                        Some((e.info.slot, e.info.pane_id, "idle_ttl"))
                    } else {
                        None
                    }
                })
                .collect()
        };
        for (slot, pane_id, reason) in expired {
            self.reap(slot, pane_id, reason).await;
        }
    }

    /// Run the reaper: sentinel scan, idle TTL, parent exit, shutdown.
    pub fn spawn_reaper(self: &Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut data = manager.host.subscribe_data(true).await.ok();
            let mut poll = tokio::time::interval(REAP_POLL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        let _ = manager.kill_all(manager.parent_role, "shutdown").await;
                        break;
                    }
                    _ = poll.tick() => {
                        if data.is_none() {
                            data = manager.host.subscribe_data(true).await.ok();
                        }
                        let parent_alive = match manager.host.status().await {
                            Ok(panes) => panes
                                .iter()
                                .any(|p| p.pane_id == manager.parent_pane && p.state.is_alive()),
                            // Daemon unreachable: treat as parent loss.
                            Err(_) => false,
                        };
                        manager.reap_pass(parent_alive).await;
                    }
                    chunk = recv_data(&mut data) => {
                        if let Some(chunk) = chunk {
                            if chunk.pane_id.is_background() {
                                let text = chunk.bytes.unwrap_or_default();
                                manager.observe_output(chunk.pane_id, &text).await;
                            }
                        } else {
                            data = manager.host.subscribe_data(true).await.ok();
                        }
                    }
                }
            }
        })
    }
}

async fn recv_data(
    rx: &mut Option<tokio::sync::mpsc::Receiver<crate::host::PaneData>>,
) -> Option<crate::host::PaneData> {
    match rx {
        Some(rx) => rx.recv().await,
        None => {
            // No subscription: park until the poll branch re-subscribes.
            std::future::pending().await
        }
    }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
