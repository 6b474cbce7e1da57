// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence Ledger: the append-only causal event store.
//!
//! Single writer owns all mutation; readers query the materialized state
//! through a cloneable [`LedgerReader`]. Retention prunes by row count and
//! age, never breaking causation chains of retained events or externally
//! protected references (team-memory evidence refs).

mod state;
mod writer;

pub use state::{EvidenceBinding, Incident, LedgerState, Span, Verdict};
pub use writer::{spawn_writer, AppendReceipt, LedgerWriterHandle};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use troupe_core::{CorrelationId, EventKind, LedgerEvent, PaneId};

use crate::wal::{Wal, WalError};

/// Default row cap before pruning.
pub const DEFAULT_MAX_ROWS: usize = 2_000_000;
/// Default age cap before pruning.
pub const DEFAULT_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("causation id {0} references an unknown event")]
    CausationUnknown(Uuid),

    #[error("event id {0} already appended")]
    DuplicateEventId(Uuid),

    #[error("ledger writer unavailable")]
    WriterUnavailable,
}

/// Query over the ledger's materialized indexes.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub correlation: Option<CorrelationId>,
    pub pane_id: Option<PaneId>,
    pub kind: Option<EventKind>,
    pub since_ms: Option<u64>,
    pub until_ms: Option<u64>,
    pub limit: Option<usize>,
}

/// Retention configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetentionCaps {
    pub max_rows: usize,
    pub max_age_ms: u64,
}

impl Default for RetentionCaps {
    fn default() -> Self {
        Self { max_rows: DEFAULT_MAX_ROWS, max_age_ms: DEFAULT_MAX_AGE_MS }
    }
}

/// Report from a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: usize,
    pub protected: usize,
}

/// The single-writer ledger core. Wrap in [`spawn_writer`] for the async
/// worker interface; hand out [`LedgerReader`]s for concurrent queries.
pub struct EvidenceLedger {
    wal: Wal<LedgerEvent>,
    state: Arc<Mutex<LedgerState>>,
    caps: RetentionCaps,
    /// Event ids protected from pruning (external evidence references).
    protected: HashSet<Uuid>,
}

impl EvidenceLedger {
    /// Open the ledger, replaying the WAL into materialized state.
    pub fn open(dir: &Path) -> Result<Self, LedgerError> {
        Self::open_with_caps(dir, RetentionCaps::default())
    }

    pub fn open_with_caps(dir: &Path, caps: RetentionCaps) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(dir).map_err(WalError::Io)?;
        let wal = Wal::open(&Self::wal_path(dir), 0)?;
        let mut state = LedgerState::default();
        for entry in wal.entries_after(0)? {
            state.apply(&entry.record);
        }
        Ok(Self {
            wal,
            state: Arc::new(Mutex::new(state)),
            caps,
            protected: HashSet::new(),
        })
    }

    pub fn wal_path(dir: &Path) -> PathBuf {
        dir.join("evidence-ledger.wal")
    }

    /// Append one event. Validates causation liveness and event-id
    /// uniqueness, assigns the per-source sequence, then persists.
    pub fn append(&mut self, mut event: LedgerEvent) -> Result<LedgerEvent, LedgerError> {
        {
            let mut state = self.state.lock();
            if state.contains(&event.event_id) {
                return Err(LedgerError::DuplicateEventId(event.event_id));
            }
            if let Some(parent) = event.causation_id {
                if !state.contains(&parent) {
                    return Err(LedgerError::CausationUnknown(parent));
                }
            }
            event.sequence = state.next_sequence(event.source);
        }
        // WAL first: the log is the fact, state is derived from it.
        self.wal.append(&event)?;
        if self.wal.needs_flush() {
            self.wal.flush()?;
        }
        self.state.lock().apply(&event);
        Ok(event)
    }

    pub fn flush(&mut self) -> Result<(), LedgerError> {
        Ok(self.wal.flush()?)
    }

    /// Mark event ids that pruning must keep (evidence refs from memory).
    pub fn protect(&mut self, event_ids: impl IntoIterator<Item = Uuid>) {
        self.protected.extend(event_ids);
    }

    /// Prune rows beyond the caps. Keeps every protected event and every
    /// causation ancestor of a retained event, then rewrites the WAL.
    pub fn prune(&mut self, now_ms: u64) -> Result<PruneReport, LedgerError> {
        let mut state = self.state.lock();
        let cutoff = now_ms.saturating_sub(self.caps.max_age_ms);
        let over_rows = state.events.len().saturating_sub(self.caps.max_rows);

        // Candidate set: too old, or the oldest rows beyond the cap.
        let mut candidates: HashSet<Uuid> = HashSet::new();
        for (index, event) in state.events.iter().enumerate() {
            if event.timestamp_ms < cutoff || index < over_rows {
                candidates.insert(event.event_id);
            }
        }
        if candidates.is_empty() {
            return Ok(PruneReport::default());
        }

        // Protect ancestors of every retained event, transitively.
        let mut keep: HashSet<Uuid> = self.protected.clone();
        for event in &state.events {
            if !candidates.contains(&event.event_id) {
                keep.insert(event.event_id);
            }
        }
        // Walk ancestor chains from kept events into the candidate set.
        let ids: Vec<Uuid> = keep.iter().copied().collect();
        for id in ids {
            for ancestor in state.ancestors(&id) {
                keep.insert(ancestor);
            }
        }

        let before = state.events.len();
        let protected = candidates.iter().filter(|id| keep.contains(id)).count();
        state.events.retain(|e| keep.contains(&e.event_id) || !candidates.contains(&e.event_id));
        state.reindex();
        let removed = before - state.events.len();
        drop(state);

        if removed > 0 {
            self.rewrite_wal()?;
        }
        Ok(PruneReport { removed, protected })
    }

    /// Rewrite the WAL from the current (pruned) state.
    fn rewrite_wal(&mut self) -> Result<(), LedgerError> {
        // Events already carry their sequence; truncating to zero then
        // re-appending preserves append order of the retained set.
        let events: Vec<LedgerEvent> = self.state.lock().events.clone();
        self.wal.truncate_before(u64::MAX)?;
        for event in &events {
            self.wal.append(event)?;
        }
        self.wal.flush()?;
        Ok(())
    }

    pub fn reader(&self) -> LedgerReader {
        LedgerReader { state: Arc::clone(&self.state) }
    }

    pub fn state_handle(&self) -> Arc<Mutex<LedgerState>> {
        Arc::clone(&self.state)
    }
}

/// Concurrent read handle over the materialized state.
#[derive(Clone)]
pub struct LedgerReader {
    state: Arc<Mutex<LedgerState>>,
}

impl LedgerReader {
    pub fn query(&self, query: &LedgerQuery) -> Vec<LedgerEvent> {
        let state = self.state.lock();
        let limit = query.limit.unwrap_or(usize::MAX);

        // Correlation queries serve straight from the index.
        if let Some(correlation) = &query.correlation {
            return state
                .correlation_timeline(correlation)
                .into_iter()
                .filter(|e| matches_rest(e, query))
                .take(limit)
                .cloned()
                .collect();
        }

        state
            .events
            .iter()
            .filter(|e| matches_rest(e, query))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, event_id: &Uuid) -> Option<LedgerEvent> {
        self.state.lock().get(event_id).cloned()
    }

    pub fn contains(&self, event_id: &Uuid) -> bool {
        self.state.lock().contains(event_id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    /// Events of one correlation in append order.
    pub fn timeline(&self, correlation: &CorrelationId) -> Vec<LedgerEvent> {
        self.state.lock().correlation_timeline(correlation).into_iter().cloned().collect()
    }

    pub fn spans(&self) -> Vec<Span> {
        self.state.lock().spans.clone()
    }
}

fn matches_rest(event: &LedgerEvent, query: &LedgerQuery) -> bool {
    if let Some(pane) = query.pane_id {
        if event.pane_id != Some(pane) {
            return false;
        }
    }
    if let Some(kind) = &query.kind {
        if &event.kind != kind {
            return false;
        }
    }
    if let Some(since) = query.since_ms {
        if event.timestamp_ms < since {
            return false;
        }
    }
    if let Some(until) = query.until_ms {
        if event.timestamp_ms > until {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
