// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical ledger event envelope.
//!
//! Events are immutable facts. The envelope carries identity
//! (`event_id`), grouping (`correlation_id`), parentage (`causation_id`),
//! and a dotted-taxonomy kind; the payload is opaque JSON, redacted by
//! default before it reaches the ledger.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::CorrelationId;
use crate::pane::PaneId;

/// Dotted event taxonomy.
///
/// Serializes as the dotted string (`"inject.requested"`); unknown strings
/// round-trip through [`EventKind::Other`] for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    // -- injection protocol --
    InjectRequested,
    InjectDeferred,
    InjectDropped,
    InjectFailed,
    InjectTimeout,
    InjectSubmitSent,
    InjectTransformApplied,
    // -- daemon --
    DaemonWriteAck,
    PtyDataReceived,
    PtyUp,
    PtyDown,
    PtyResizeAck,
    PaneHealth,
    // -- verification --
    VerifyPass,
    VerifyFalsePositive,
    // -- CLI-side observations --
    CompactionStarted,
    CompactionEnded,
    // -- stores --
    LedgerFlushed,
    SpanOpened,
    SpanClosed,
    IncidentRecorded,
    VerdictRecorded,
    EvidenceBound,
    // -- claims and experiments --
    ClaimCreated,
    ClaimStatusChanged,
    ConsensusRecorded,
    ContradictionDetected,
    PatternDetected,
    GuardTriggered,
    ExperimentStarted,
    ExperimentCompleted,
    // -- transitions --
    TransitionInvalid,
    // -- broker / fallback --
    MessageAccepted,
    TriggerWritten,
    TriggerConsumed,
    // -- background workers --
    BackgroundSpawned,
    BackgroundReaped,
    // -- contract violations (observability) --
    ContractViolation,
    /// Unknown kind, preserved verbatim.
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::InjectRequested => "inject.requested",
            EventKind::InjectDeferred => "inject.deferred",
            EventKind::InjectDropped => "inject.dropped",
            EventKind::InjectFailed => "inject.failed",
            EventKind::InjectTimeout => "inject.timeout",
            EventKind::InjectSubmitSent => "inject.submit.sent",
            EventKind::InjectTransformApplied => "inject.transform.applied",
            EventKind::DaemonWriteAck => "daemon.write.ack",
            EventKind::PtyDataReceived => "pty.data.received",
            EventKind::PtyUp => "pty.up",
            EventKind::PtyDown => "pty.down",
            EventKind::PtyResizeAck => "pty.resize.ack",
            EventKind::PaneHealth => "pane.health",
            EventKind::VerifyPass => "verify.pass",
            EventKind::VerifyFalsePositive => "verify.false_positive",
            EventKind::CompactionStarted => "cli.compaction.started",
            EventKind::CompactionEnded => "cli.compaction.ended",
            EventKind::LedgerFlushed => "ledger.flushed",
            EventKind::SpanOpened => "span.opened",
            EventKind::SpanClosed => "span.closed",
            EventKind::IncidentRecorded => "incident.recorded",
            EventKind::VerdictRecorded => "verdict.recorded",
            EventKind::EvidenceBound => "evidence.bound",
            EventKind::ClaimCreated => "claim.created",
            EventKind::ClaimStatusChanged => "claim.status_changed",
            EventKind::ConsensusRecorded => "claim.consensus_recorded",
            EventKind::ContradictionDetected => "belief.contradiction",
            EventKind::PatternDetected => "pattern.detected",
            EventKind::GuardTriggered => "guard.triggered",
            EventKind::ExperimentStarted => "experiment.started",
            EventKind::ExperimentCompleted => "experiment.completed",
            EventKind::TransitionInvalid => "transition.invalid",
            EventKind::MessageAccepted => "message.accepted",
            EventKind::TriggerWritten => "trigger.written",
            EventKind::TriggerConsumed => "trigger.consumed",
            EventKind::BackgroundSpawned => "bg.spawned",
            EventKind::BackgroundReaped => "bg.reaped",
            EventKind::ContractViolation => "contract.violation",
            EventKind::Other(s) => s,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "inject.requested" => EventKind::InjectRequested,
            "inject.deferred" => EventKind::InjectDeferred,
            "inject.dropped" => EventKind::InjectDropped,
            "inject.failed" => EventKind::InjectFailed,
            "inject.timeout" => EventKind::InjectTimeout,
            "inject.submit.sent" => EventKind::InjectSubmitSent,
            "inject.transform.applied" => EventKind::InjectTransformApplied,
            "daemon.write.ack" => EventKind::DaemonWriteAck,
            "pty.data.received" => EventKind::PtyDataReceived,
            "pty.up" => EventKind::PtyUp,
            "pty.down" => EventKind::PtyDown,
            "pty.resize.ack" => EventKind::PtyResizeAck,
            "pane.health" => EventKind::PaneHealth,
            "verify.pass" => EventKind::VerifyPass,
            "verify.false_positive" => EventKind::VerifyFalsePositive,
            "cli.compaction.started" => EventKind::CompactionStarted,
            "cli.compaction.ended" => EventKind::CompactionEnded,
            "ledger.flushed" => EventKind::LedgerFlushed,
            "span.opened" => EventKind::SpanOpened,
            "span.closed" => EventKind::SpanClosed,
            "incident.recorded" => EventKind::IncidentRecorded,
            "verdict.recorded" => EventKind::VerdictRecorded,
            "evidence.bound" => EventKind::EvidenceBound,
            "claim.created" => EventKind::ClaimCreated,
            "claim.status_changed" => EventKind::ClaimStatusChanged,
            "claim.consensus_recorded" => EventKind::ConsensusRecorded,
            "belief.contradiction" => EventKind::ContradictionDetected,
            "pattern.detected" => EventKind::PatternDetected,
            "guard.triggered" => EventKind::GuardTriggered,
            "experiment.started" => EventKind::ExperimentStarted,
            "experiment.completed" => EventKind::ExperimentCompleted,
            "transition.invalid" => EventKind::TransitionInvalid,
            "message.accepted" => EventKind::MessageAccepted,
            "trigger.written" => EventKind::TriggerWritten,
            "trigger.consumed" => EventKind::TriggerConsumed,
            "bg.spawned" => EventKind::BackgroundSpawned,
            "bg.reaped" => EventKind::BackgroundReaped,
            "contract.violation" => EventKind::ContractViolation,
            _ => EventKind::Other(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> String {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who emitted an event. Sequences are monotonic per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Daemon,
    Delivery,
    Broker,
    Watcher,
    Memory,
    Experiment,
    Background,
    Cli,
    System,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventSource::Daemon => "daemon",
            EventSource::Delivery => "delivery",
            EventSource::Broker => "broker",
            EventSource::Watcher => "watcher",
            EventSource::Memory => "memory",
            EventSource::Experiment => "experiment",
            EventSource::Background => "background",
            EventSource::Cli => "cli",
            EventSource::System => "system",
        };
        write!(f, "{s}")
    }
}

/// Canonical immutable event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: Uuid,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    pub kind: EventKind,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<PaneId>,
    pub timestamp_ms: u64,
    /// Per-source monotonic sequence, assigned by the ledger writer.
    #[serde(default)]
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl LedgerEvent {
    /// Build an event with a fresh id, no parent, and an empty payload.
    pub fn new(kind: EventKind, source: EventSource, correlation_id: CorrelationId) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            correlation_id,
            causation_id: None,
            kind,
            source,
            pane_id: None,
            timestamp_ms: 0,
            sequence: 0,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_pane(mut self, pane_id: PaneId) -> Self {
        self.pane_id = Some(pane_id);
        self
    }

    pub fn with_cause(mut self, parent: Uuid) -> Self {
        self.causation_id = Some(parent);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
