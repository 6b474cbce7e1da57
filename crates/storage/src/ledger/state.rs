// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized ledger state built from WAL replay.
//!
//! Events are facts; everything here is derived and rebuildable. Apply is
//! idempotent: re-applying an already-known event id is a no-op.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use troupe_core::{CorrelationId, EventKind, EventSource, LedgerEvent};

/// Open/close marker for a long operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub correlation_id: CorrelationId,
    pub label: String,
    pub opened_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
}

/// Recorded operational incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub event_id: Uuid,
    pub summary: String,
    pub recorded_at_ms: u64,
}

/// Recorded verdict on an incident or operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub event_id: Uuid,
    pub subject: String,
    pub verdict: String,
    pub recorded_at_ms: u64,
}

/// Link between a ledger event and an external consumer (team memory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBinding {
    pub event_id: Uuid,
    pub bound_to: String,
    pub recorded_at_ms: u64,
}

/// Materialized state for the Evidence Ledger.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    /// Append order; the source of truth for causality.
    pub events: Vec<LedgerEvent>,
    /// event id → index into `events`.
    #[serde(skip)]
    pub by_id: HashMap<Uuid, usize>,
    /// correlation id → event indices, append order.
    #[serde(skip)]
    pub by_correlation: HashMap<CorrelationId, Vec<usize>>,
    /// causedBy adjacency: parent event id → child event ids.
    #[serde(skip)]
    pub edges: HashMap<Uuid, Vec<Uuid>>,
    /// Per-source monotonic sequence counters.
    pub sequences: HashMap<EventSource, u64>,
    pub spans: Vec<Span>,
    pub incidents: Vec<Incident>,
    pub verdicts: Vec<Verdict>,
    pub bindings: Vec<EvidenceBinding>,
}

impl LedgerState {
    /// Apply one event. Idempotent on event id.
    pub fn apply(&mut self, event: &LedgerEvent) {
        if self.by_id.contains_key(&event.event_id) {
            return;
        }
        let index = self.events.len();
        self.by_id.insert(event.event_id, index);
        self.by_correlation.entry(event.correlation_id).or_default().push(index);
        if let Some(parent) = event.causation_id {
            self.edges.entry(parent).or_default().push(event.event_id);
        }
        let seq = self.sequences.entry(event.source).or_insert(0);
        *seq = (*seq).max(event.sequence);
        self.apply_auxiliary(event);
        self.events.push(event.clone());
    }

    /// Auxiliary tables derived from specific event kinds.
    fn apply_auxiliary(&mut self, event: &LedgerEvent) {
        match &event.kind {
            EventKind::SpanOpened => {
                let label = payload_str(event, "label");
                self.spans.push(Span {
                    correlation_id: event.correlation_id,
                    label,
                    opened_at_ms: event.timestamp_ms,
                    closed_at_ms: None,
                });
            }
            EventKind::SpanClosed => {
                if let Some(span) = self
                    .spans
                    .iter_mut()
                    .rev()
                    .find(|s| s.correlation_id == event.correlation_id && s.closed_at_ms.is_none())
                {
                    span.closed_at_ms = Some(event.timestamp_ms);
                }
            }
            EventKind::IncidentRecorded => {
                self.incidents.push(Incident {
                    event_id: event.event_id,
                    summary: payload_str(event, "summary"),
                    recorded_at_ms: event.timestamp_ms,
                });
            }
            EventKind::VerdictRecorded => {
                self.verdicts.push(Verdict {
                    event_id: event.event_id,
                    subject: payload_str(event, "subject"),
                    verdict: payload_str(event, "verdict"),
                    recorded_at_ms: event.timestamp_ms,
                });
            }
            EventKind::EvidenceBound => {
                self.bindings.push(EvidenceBinding {
                    event_id: event.event_id,
                    bound_to: payload_str(event, "bound_to"),
                    recorded_at_ms: event.timestamp_ms,
                });
            }
            _ => {}
        }
    }

    /// Rebuild the skipped indexes after deserialization or pruning.
    pub fn reindex(&mut self) {
        self.by_id.clear();
        self.by_correlation.clear();
        self.edges.clear();
        for (index, event) in self.events.iter().enumerate() {
            self.by_id.insert(event.event_id, index);
            self.by_correlation.entry(event.correlation_id).or_default().push(index);
            if let Some(parent) = event.causation_id {
                self.edges.entry(parent).or_default().push(event.event_id);
            }
        }
    }

    pub fn contains(&self, event_id: &Uuid) -> bool {
        self.by_id.contains_key(event_id)
    }

    pub fn get(&self, event_id: &Uuid) -> Option<&LedgerEvent> {
        self.by_id.get(event_id).map(|&i| &self.events[i])
    }

    /// Full operation timeline, append order.
    pub fn correlation_timeline(&self, correlation: &CorrelationId) -> Vec<&LedgerEvent> {
        self.by_correlation
            .get(correlation)
            .map(|indices| indices.iter().map(|&i| &self.events[i]).collect())
            .unwrap_or_default()
    }

    /// Next sequence for a source.
    pub fn next_sequence(&mut self, source: EventSource) -> u64 {
        let seq = self.sequences.entry(source).or_insert(0);
        *seq += 1;
        *seq
    }

    /// The causation ancestor chain of `event_id`, nearest first.
    pub fn ancestors(&self, event_id: &Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.get(event_id).and_then(|e| e.causation_id);
        while let Some(parent) = cursor {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            cursor = self.get(&parent).and_then(|e| e.causation_id);
        }
        chain
    }
}

fn payload_str(event: &LedgerEvent, key: &str) -> String {
    event
        .payload
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
