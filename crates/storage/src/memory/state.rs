// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized team-memory state from WAL replay.
//!
//! All op handlers are idempotent: applying the same op twice must produce
//! the same state as applying it once, because ops may be applied both on
//! the write path (immediate visibility) and again during replay.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use troupe_core::claim::{
    BeliefSnapshot, Claim, ClaimEvidence, ClaimId, ClaimStatus, Contradiction, Decision,
    DecisionId, ExperimentId, ExperimentRecord, Guard, GuardId, Pattern, PatternId, StatusChange,
};
use troupe_core::{ConsensusPosition, Role};

use super::op::MemoryOp;
use super::search::TextIndex;

/// One agent's recorded position on a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusEdge {
    pub agent: Role,
    pub position: ConsensusPosition,
    pub reason: String,
    pub recorded_at_ms: u64,
}

/// Materialized state built from memory ops.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryState {
    pub claims: HashMap<ClaimId, Claim>,
    /// idempotency key → claim id.
    pub by_idempotency: HashMap<String, ClaimId>,
    /// claim id → scope tags.
    pub scopes: HashMap<ClaimId, Vec<String>>,
    /// scope tag → claim ids.
    pub by_scope: HashMap<String, HashSet<ClaimId>>,
    pub evidence: HashMap<ClaimId, Vec<ClaimEvidence>>,
    /// claim id → per-agent consensus edge (upsert semantics).
    pub consensus: HashMap<ClaimId, Vec<ConsensusEdge>>,
    pub status_history: Vec<StatusChange>,
    pub decisions: HashMap<DecisionId, Decision>,
    /// Latest belief snapshot per agent.
    pub snapshots: HashMap<Role, BeliefSnapshot>,
    pub contradictions: Vec<Contradiction>,
    pub patterns: HashMap<PatternId, Pattern>,
    pub guards: HashMap<GuardId, Guard>,
    pub experiments: HashMap<ExperimentId, ExperimentRecord>,
    pub experiments_by_key: HashMap<String, ExperimentId>,
    /// Full-text index over claim statements. Rebuilt on load.
    #[serde(skip)]
    pub text_index: TextIndex,
}

impl MemoryState {
    /// Apply an op to derive state changes. Idempotent.
    pub fn apply_op(&mut self, op: &MemoryOp) {
        match op {
            MemoryOp::ClaimCreated { claim, scopes } => self.apply_claim_created(claim, scopes),

            MemoryOp::StatusChanged { change } => {
                if let Some(claim) = self.claims.get_mut(&change.claim_id) {
                    if claim.status == change.previous {
                        claim.status = change.next;
                        claim.updated_at_ms = change.changed_at_ms;
                        self.status_history.push(change.clone());
                    }
                }
            }

            MemoryOp::EvidenceAdded { evidence } => {
                let rows = self.evidence.entry(evidence.claim_id).or_default();
                let duplicate = rows.iter().any(|e| {
                    e.evidence_event_ref == evidence.evidence_event_ref
                        && e.relation == evidence.relation
                });
                if !duplicate {
                    rows.push(evidence.clone());
                }
            }

            MemoryOp::ConsensusRecorded { claim_id, agent, position, reason, at_ms } => {
                let edges = self.consensus.entry(*claim_id).or_default();
                match edges.iter_mut().find(|e| e.agent == *agent) {
                    Some(edge) => {
                        edge.position = *position;
                        edge.reason = reason.clone();
                        edge.recorded_at_ms = *at_ms;
                    }
                    None => edges.push(ConsensusEdge {
                        agent: *agent,
                        position: *position,
                        reason: reason.clone(),
                        recorded_at_ms: *at_ms,
                    }),
                }
            }

            MemoryOp::DecisionCreated { decision } => {
                self.decisions.entry(decision.decision_id).or_insert_with(|| decision.clone());
            }

            MemoryOp::OutcomeRecorded { decision_id, outcome, notes, .. } => {
                if let Some(decision) = self.decisions.get_mut(decision_id) {
                    decision.outcome = Some(*outcome);
                    decision.outcome_notes = notes.clone();
                }
            }

            MemoryOp::SnapshotTaken { snapshot } => {
                self.snapshots.insert(snapshot.agent, snapshot.clone());
            }

            MemoryOp::ContradictionDetected { contradiction } => {
                let exists = self.contradictions.iter().any(|c| {
                    c.claim_id == contradiction.claim_id
                        && c.agent_a == contradiction.agent_a
                        && c.agent_b == contradiction.agent_b
                });
                if !exists {
                    self.contradictions.push(contradiction.clone());
                }
            }

            MemoryOp::PatternUpserted { pattern } => {
                self.patterns.insert(pattern.pattern_id, pattern.clone());
            }

            MemoryOp::GuardCreated { guard } => {
                self.guards.entry(guard.guard_id).or_insert_with(|| guard.clone());
            }

            MemoryOp::ExperimentQueued { record } => {
                if !self.experiments.contains_key(&record.experiment_id) {
                    self.experiments_by_key
                        .insert(record.idempotency_key.clone(), record.experiment_id);
                    self.experiments.insert(record.experiment_id, record.clone());
                }
            }

            MemoryOp::ExperimentStatusChanged { experiment_id, status, exit_code, at_ms } => {
                if let Some(record) = self.experiments.get_mut(experiment_id) {
                    record.status = *status;
                    if exit_code.is_some() {
                        record.exit_code = *exit_code;
                    }
                    record.updated_at_ms = *at_ms;
                }
            }

            MemoryOp::ExperimentAttached { experiment_id, evidence_event_ref, at_ms } => {
                if let Some(record) = self.experiments.get_mut(experiment_id) {
                    record.evidence_event_ref = Some(evidence_event_ref.clone());
                    record.status = troupe_core::ExperimentStatus::Attached;
                    record.updated_at_ms = *at_ms;
                }
            }

            MemoryOp::Custom => {}
        }
    }

    fn apply_claim_created(&mut self, claim: &Claim, scopes: &[String]) {
        // Idempotency: the key wins over the id so a replayed create with a
        // regenerated id still dedupes.
        if self.by_idempotency.contains_key(&claim.idempotency_key) {
            return;
        }
        self.by_idempotency.insert(claim.idempotency_key.clone(), claim.claim_id);
        self.scopes.insert(claim.claim_id, scopes.to_vec());
        for scope in scopes {
            self.by_scope.entry(scope.clone()).or_default().insert(claim.claim_id);
        }
        self.text_index.insert(claim.claim_id, &claim.statement);
        self.claims.insert(claim.claim_id, claim.clone());
    }

    /// Rebuild the text index (after snapshot load).
    pub fn reindex(&mut self) {
        self.text_index = TextIndex::default();
        for claim in self.claims.values() {
            self.text_index.insert(claim.claim_id, &claim.statement);
        }
    }

    /// Challenge / support counts for a claim.
    pub fn edge_counts(&self, claim_id: &ClaimId) -> (usize, usize) {
        let edges = match self.consensus.get(claim_id) {
            Some(edges) => edges,
            None => return (0, 0),
        };
        let supports =
            edges.iter().filter(|e| e.position == ConsensusPosition::Support).count();
        let challenges =
            edges.iter().filter(|e| e.position == ConsensusPosition::Challenge).count();
        (supports, challenges)
    }

    /// Walk the supersedes chain from `start`; true if `needle` is reachable.
    pub fn supersedes_reaches(&self, start: &ClaimId, needle: &ClaimId) -> bool {
        let mut seen = HashSet::new();
        let mut cursor = Some(*start);
        while let Some(id) = cursor {
            if &id == needle {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            cursor = self.claims.get(&id).and_then(|c| c.supersedes);
        }
        false
    }

    /// Expired claims by TTL at `now_ms`.
    pub fn expired_claims(&self, now_ms: u64) -> Vec<ClaimId> {
        self.claims
            .values()
            .filter(|c| !c.status.is_terminal())
            .filter(|c| {
                c.ttl_hours
                    .map(|h| now_ms.saturating_sub(c.created_at_ms) > u64::from(h) * 3_600_000)
                    .unwrap_or(false)
            })
            .map(|c| c.claim_id)
            .collect()
    }

    /// The status consensus would assign, or `None` for no change.
    ///
    /// `pendingProof` is gated on experiment resolution and is never moved
    /// by consensus recomputation.
    pub fn recomputed_status(&self, claim_id: &ClaimId) -> Option<ClaimStatus> {
        let claim = self.claims.get(claim_id)?;
        let (supports, challenges) = self.edge_counts(claim_id);
        let next = match claim.status {
            ClaimStatus::Proposed if challenges > 0 => ClaimStatus::Contested,
            ClaimStatus::Proposed if supports > 0 => ClaimStatus::Confirmed,
            ClaimStatus::Confirmed if challenges > 0 => ClaimStatus::Contested,
            ClaimStatus::Contested if challenges == 0 && supports > 0 => ClaimStatus::Confirmed,
            _ => return None,
        };
        (next != claim.status).then_some(next)
    }
}
