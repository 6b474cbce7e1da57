// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Team-memory WAL records.
//!
//! Every mutation is an op; state is derived by replay. Ops serialize with
//! `{"type": "family:name", ...fields}`; unknown tags deserialize to
//! `Custom` so newer logs replay on older builds.

use serde::{Deserialize, Serialize};

use troupe_core::claim::{
    BeliefSnapshot, Claim, ClaimEvidence, ClaimId, Contradiction, Decision, DecisionId,
    DecisionOutcome, ExperimentId, ExperimentRecord, ExperimentStatus, Guard, Pattern,
    StatusChange,
};
use troupe_core::{ConsensusPosition, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MemoryOp {
    #[serde(rename = "claim:created")]
    ClaimCreated {
        claim: Claim,
        #[serde(default)]
        scopes: Vec<String>,
    },

    #[serde(rename = "claim:status_changed")]
    StatusChanged { change: StatusChange },

    #[serde(rename = "claim:evidence_added")]
    EvidenceAdded { evidence: ClaimEvidence },

    #[serde(rename = "claim:consensus")]
    ConsensusRecorded {
        claim_id: ClaimId,
        agent: Role,
        position: ConsensusPosition,
        reason: String,
        at_ms: u64,
    },

    #[serde(rename = "decision:created")]
    DecisionCreated { decision: Decision },

    #[serde(rename = "decision:outcome")]
    OutcomeRecorded {
        decision_id: DecisionId,
        outcome: DecisionOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        at_ms: u64,
    },

    #[serde(rename = "belief:snapshot")]
    SnapshotTaken { snapshot: BeliefSnapshot },

    #[serde(rename = "belief:contradiction")]
    ContradictionDetected { contradiction: Contradiction },

    #[serde(rename = "pattern:upserted")]
    PatternUpserted { pattern: Pattern },

    #[serde(rename = "guard:created")]
    GuardCreated { guard: Guard },

    #[serde(rename = "experiment:queued")]
    ExperimentQueued { record: ExperimentRecord },

    #[serde(rename = "experiment:status")]
    ExperimentStatusChanged {
        experiment_id: ExperimentId,
        status: ExperimentStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        at_ms: u64,
    },

    #[serde(rename = "experiment:attached")]
    ExperimentAttached {
        experiment_id: ExperimentId,
        evidence_event_ref: String,
        at_ms: u64,
    },

    /// Catch-all for unknown op types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}
