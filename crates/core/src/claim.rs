// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The team-memory claim graph model.
//!
//! A claim is a typed, owned, lifecycle-bearing statement of team
//! knowledge. Consensus edges, evidence links, decisions, belief
//! snapshots, contradictions, patterns, guards, and experiments all hang
//! off claims. The status state machine here is the single source of
//! truth; the store enforces it on every transition.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::envelope::SessionId;
use crate::role::Role;

define_id! {
    /// Claim id (`clm-` prefix).
    pub struct ClaimId("clm-");
}

define_id! {
    /// Decision id (`dcn-` prefix).
    pub struct DecisionId("dcn-");
}

define_id! {
    /// Pattern id (`pat-` prefix).
    pub struct PatternId("pat-");
}

define_id! {
    /// Guard id (`grd-` prefix).
    pub struct GuardId("grd-");
}

define_id! {
    /// Experiment run id (`exp-` prefix).
    pub struct ExperimentId("exp-");
}

/// What kind of knowledge a claim states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Fact,
    Decision,
    Hypothesis,
    /// Negative knowledge: something tried and known not to work.
    Negative,
}

/// Claim lifecycle status. `Deprecated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimStatus {
    Proposed,
    Confirmed,
    Contested,
    Deprecated,
    PendingProof,
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Deprecated)
    }

    /// The allowed (previous, next) pairs of the status state machine.
    ///
    /// Deprecation is allowed from every non-terminal state; nothing
    /// leaves `Deprecated` — superseding knowledge creates a new claim.
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        match (*self, next) {
            (Deprecated, _) => false,
            (_, Deprecated) => true,
            (Proposed, Confirmed) | (Proposed, Contested) => true,
            (Confirmed, Contested) => true,
            (Contested, Confirmed) | (Contested, PendingProof) => true,
            (PendingProof, Confirmed) | (PendingProof, Contested) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClaimStatus::Proposed => "proposed",
            ClaimStatus::Confirmed => "confirmed",
            ClaimStatus::Contested => "contested",
            ClaimStatus::Deprecated => "deprecated",
            ClaimStatus::PendingProof => "pendingProof",
        };
        write!(f, "{s}")
    }
}

/// One agent's position on one claim. At most one edge per (claim, agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusPosition {
    Support,
    Challenge,
    Abstain,
}

/// How a piece of ledger evidence relates to a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvidenceRelation {
    Supports,
    Contradicts,
    CausedBy,
}

/// A team-memory fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: ClaimId,
    /// Unique; duplicate creations return the existing claim.
    pub idempotency_key: String,
    pub statement: String,
    pub claim_type: ClaimType,
    pub owner_role: Role,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ClaimId>,
    pub session: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_hours: Option<u32>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Evidence link: a textual reference into the Evidence Ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEvidence {
    pub claim_id: ClaimId,
    /// Textual event reference (`evt:<uuid>`); liveness is verified by a
    /// background sweep that reports orphans without deleting.
    pub evidence_event_ref: String,
    pub relation: EvidenceRelation,
    pub weight: f64,
    pub added_by: Role,
    pub added_at_ms: u64,
}

/// One row of a claim's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub claim_id: ClaimId,
    pub previous: ClaimStatus,
    pub next: ClaimStatus,
    pub changed_by: Role,
    pub reason: String,
    pub changed_at_ms: u64,
}

/// Outcome of a recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Success,
    Partial,
    Failure,
    Unknown,
}

/// A decision taken on a claim, with the alternatives that were weighed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: DecisionId,
    pub claim_id: ClaimId,
    pub decided_by: Role,
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DecisionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_notes: Option<String>,
    pub created_at_ms: u64,
}

/// A materialized view of one agent's believed claims at a moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefSnapshot {
    pub agent: Role,
    pub session: SessionId,
    /// Claim ids the agent supports or owns un-challenged.
    pub believed: Vec<ClaimId>,
    /// Claim ids the agent challenges.
    pub rejected: Vec<ClaimId>,
    pub taken_at_ms: u64,
}

/// A detected disagreement between two agents' latest snapshots.
///
/// Stored once per unordered pair; `(a, b)` is canonically ordered so the
/// mirrored row is elided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub claim_id: ClaimId,
    pub agent_a: Role,
    pub agent_b: Role,
    /// Denormalized for fast filtering.
    pub session: SessionId,
    pub detected_at_ms: u64,
}

/// Pattern kinds the engine mines for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    HandoffLoop,
    EscalationSpiral,
    Stall,
    ContradictionCluster,
}

/// A detected behavioral pattern with a time-decayed risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: PatternId,
    pub kind: PatternKind,
    pub frequency: u32,
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<ClaimId>,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
}

/// What a tripped guard does. Hard blocking is deliberately not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardAction {
    Warn,
    Escalate,
}

/// A predicate → action rule bound to a source claim or pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub guard_id: GuardId,
    /// Trigger predicate over claim/pattern state, e.g.
    /// `"status == contested && challenges >= 2"`.
    pub trigger: String,
    pub action: GuardAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_claim: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_pattern: Option<PatternId>,
    pub created_at_ms: u64,
}

/// Experiment run status progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExperimentStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Canceled,
    AttachPending,
    Attached,
}

impl ExperimentStatus {
    /// Has the child process finished (successfully or not)?
    pub fn is_settled(&self) -> bool {
        !matches!(self, ExperimentStatus::Queued | ExperimentStatus::Running)
    }
}

/// One experiment run: a named profile converted into executable proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub experiment_id: ExperimentId,
    pub profile: String,
    #[serde(default)]
    pub args: std::collections::HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<EvidenceRelation>,
    pub requested_by: Role,
    pub status: ExperimentStatus,
    /// Dedup key over (profile, args, repository revision, caller key).
    pub idempotency_key: String,
    #[serde(default)]
    pub repository_revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<std::path::PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Ledger reference (`evt:<uuid>`) once the outcome event is bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_event_ref: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;
