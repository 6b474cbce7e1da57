// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition envelopes: stateful records that aggregate the events of one
//! multi-step operation (request → apply → verify) by correlation id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::define_id;
use crate::event::EventKind;
use crate::id::CorrelationId;
use crate::pane::PaneId;
use crate::role::Role;

define_id! {
    /// Transition id (`trn-` prefix).
    pub struct TransitionId("trn-");
}

/// Phase of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Requested,
    Accepted,
    Deferred,
    Applied,
    Verifying,
    Verified,
    Failed,
    TimedOut,
    Dropped,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Verified | Phase::Failed | Phase::TimedOut | Phase::Dropped | Phase::Cancelled
        )
    }

    /// Allowed phase successions.
    pub fn can_advance_to(&self, next: Phase) -> bool {
        use Phase::*;
        match (*self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Requested, Accepted) | (Requested, Deferred) | (Requested, Dropped) => true,
            (Accepted, Applied) | (Accepted, Failed) | (Accepted, TimedOut) => true,
            (Deferred, Accepted) | (Deferred, Dropped) | (Deferred, TimedOut) => true,
            (Applied, Verifying) | (Applied, Failed) => true,
            (Verifying, Verified) | (Verifying, Failed) | (Verifying, TimedOut) => true,
            _ => false,
        }
    }

    /// Phases only the lease owner may drive.
    pub fn is_owner_mutation(&self) -> bool {
        matches!(self, Phase::Applied | Phase::Verifying | Phase::Verified)
    }
}

/// Strength classification of an observed evidence signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvidenceClass {
    None,
    Weak,
    Strong,
    Disallowed,
}

impl EvidenceClass {
    /// Default classification of a ledger event kind.
    pub fn of(kind: &EventKind) -> EvidenceClass {
        match kind {
            EventKind::VerifyPass => EvidenceClass::Strong,
            EventKind::DaemonWriteAck | EventKind::PtyDataReceived => EvidenceClass::Weak,
            _ => EvidenceClass::None,
        }
    }
}

/// What evidence a transition requires before it may finalize as verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSpec {
    pub required_class: EvidenceClass,
    #[serde(default)]
    pub accepted_signals: Vec<String>,
    #[serde(default)]
    pub disallowed_signals: Vec<String>,
}

impl Default for EvidenceSpec {
    fn default() -> Self {
        Self {
            required_class: EvidenceClass::Strong,
            accepted_signals: Vec::new(),
            disallowed_signals: Vec::new(),
        }
    }
}

/// Exclusive right to drive mutation phases, granted to one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerLease {
    pub module: String,
    pub lease_id: Uuid,
    pub acquired_at_ms: u64,
    pub lease_ttl_ms: u64,
}

impl OwnerLease {
    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.acquired_at_ms) > self.lease_ttl_ms
    }
}

/// Who originated the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOrigin {
    pub actor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub source: String,
}

/// Final verdict of a closed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionOutcome {
    Verified,
    /// Weak evidence only; accepted because the evidence spec allowed it.
    RiskedPass,
    Failed,
    TimedOut,
    Dropped,
    Cancelled,
    Unknown,
}

/// One recorded phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    pub at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Verification summary stamped at finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub outcome: TransitionOutcome,
    pub observed_class: EvidenceClass,
    pub confidence: f64,
    pub verified_at_ms: u64,
}

/// Stateful envelope tracking one multi-event operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub transition_id: TransitionId,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<PaneId>,
    pub category: String,
    pub intent_type: String,
    pub transition_type: String,
    pub origin: TransitionOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerLease>,
    pub phase: Phase,
    #[serde(default)]
    pub phase_history: Vec<PhaseChange>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub evidence_spec: EvidenceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    /// Observed evidence: (event id, kind, class) triples.
    #[serde(default)]
    pub evidence: Vec<(Uuid, EventKind, EvidenceClass)>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub closed: bool,
}

impl Transition {
    pub fn new(correlation_id: CorrelationId, origin: TransitionOrigin, now_ms: u64) -> Self {
        Self {
            transition_id: TransitionId::new(),
            correlation_id,
            causation_id: None,
            pane_id: None,
            category: String::new(),
            intent_type: String::new(),
            transition_type: String::new(),
            origin,
            owner: None,
            phase: Phase::Requested,
            phase_history: Vec::new(),
            preconditions: Vec::new(),
            evidence_spec: EvidenceSpec::default(),
            verification: None,
            reason_code: None,
            evidence: Vec::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            closed: false,
        }
    }

    /// Highest evidence class observed so far (`Disallowed` dominates).
    pub fn observed_class(&self) -> EvidenceClass {
        self.evidence
            .iter()
            .map(|(_, _, class)| *class)
            .max()
            .unwrap_or(EvidenceClass::None)
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
