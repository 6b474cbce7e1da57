// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Team Memory: the shared, session-surviving claim graph.
//!
//! Single-writer over a WAL of [`MemoryOp`]s with a zstd snapshot
//! checkpoint; readers query the materialized state concurrently. Agent
//! identifiers are normalized through the alias table before any write —
//! the store only ever sees canonical roles.

pub mod op;
pub mod patterns;
mod search;
mod state;
mod writer;

pub use op::MemoryOp;
pub use patterns::{evaluate_guards, GuardHit};
pub use search::TextIndex;
pub use state::{ConsensusEdge, MemoryState};
pub use writer::{spawn_memory_writer, TeamMemoryHandle};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use troupe_core::claim::{
    BeliefSnapshot, Claim, ClaimEvidence, ClaimId, ClaimStatus, ClaimType, Contradiction,
    Decision, DecisionId, DecisionOutcome, EvidenceRelation, ExperimentId, ExperimentRecord,
    ExperimentStatus, Guard, GuardAction, GuardId, StatusChange,
};
use troupe_core::{ConsensusPosition, Role, SessionId};

use crate::snapshot::{Snapshot, SnapshotError};
use crate::wal::{Wal, WalError};

/// Checkpoint after this many ops accumulate past the last snapshot.
const CHECKPOINT_EVERY: u64 = 1_000;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("claim {0} not found")]
    ClaimNotFound(ClaimId),

    #[error("decision {0} not found")]
    DecisionNotFound(DecisionId),

    #[error("experiment {0} not found")]
    ExperimentNotFound(ExperimentId),

    #[error("invalid transition {previous} -> {next} for claim {claim_id}")]
    InvalidTransition {
        claim_id: ClaimId,
        previous: ClaimStatus,
        next: ClaimStatus,
    },

    #[error("supersedes chain from {0} would form a cycle")]
    SupersedesCycle(ClaimId),

    #[error("confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("unknown agent alias {0:?}")]
    UnknownAlias(String),

    #[error("memory writer unavailable")]
    WriterUnavailable,
}

/// Result of a claim creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateClaimOutcome {
    pub claim_id: ClaimId,
    /// True when the idempotency key matched an existing claim.
    pub deduplicated: bool,
}

/// Parameters for `create_claim`.
#[derive(Debug, Clone)]
pub struct CreateClaim {
    pub statement: String,
    pub claim_type: ClaimType,
    pub owner_role: Role,
    pub scopes: Vec<String>,
    pub confidence: f64,
    pub session: SessionId,
    pub ttl_hours: Option<u32>,
    pub supersedes: Option<ClaimId>,
    pub idempotency_key: String,
}

/// Combined claim query: every populated filter must match.
#[derive(Debug, Clone, Default)]
pub struct ClaimQuery {
    pub scopes: Vec<String>,
    pub claim_type: Option<ClaimType>,
    pub status: Option<ClaimStatus>,
    pub owner: Option<Role>,
    pub session: Option<SessionId>,
    pub since_ms: Option<u64>,
    pub until_ms: Option<u64>,
    pub text: Option<String>,
    pub limit: Option<usize>,
    /// Resume after this claim id (creation order).
    pub cursor: Option<ClaimId>,
}

/// Orphaned evidence reference found by the integrity sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanReport {
    pub claim_id: ClaimId,
    pub evidence_event_ref: String,
}

/// The single-writer team memory core.
pub struct TeamMemory {
    wal: Wal<MemoryOp>,
    state: Arc<Mutex<MemoryState>>,
    dir: PathBuf,
    aliases: HashMap<String, Role>,
    ops_since_checkpoint: u64,
    snapshot_covered_seq: u64,
}

impl TeamMemory {
    /// Open the store: snapshot (if any) plus WAL tail replay.
    pub fn open(dir: &Path, aliases: HashMap<String, Role>) -> Result<Self, MemoryError> {
        std::fs::create_dir_all(dir).map_err(WalError::Io)?;
        let snapshot: Option<Snapshot<MemoryState>> = Snapshot::load(&Self::snapshot_path(dir))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "memory snapshot unreadable, replaying full WAL");
                None
            });
        let (mut state, covered_seq) = match snapshot {
            Some(snapshot) => (snapshot.state, snapshot.covered_seq),
            None => (MemoryState::default(), 0),
        };
        state.reindex();

        let wal = Wal::open(&Self::wal_path(dir), covered_seq)?;
        for entry in wal.entries_after(covered_seq)? {
            state.apply_op(&entry.record);
        }
        Ok(Self {
            wal,
            state: Arc::new(Mutex::new(state)),
            dir: dir.to_path_buf(),
            aliases,
            ops_since_checkpoint: 0,
            snapshot_covered_seq: covered_seq,
        })
    }

    pub fn wal_path(dir: &Path) -> PathBuf {
        dir.join("team-memory.wal")
    }

    pub fn snapshot_path(dir: &Path) -> PathBuf {
        dir.join("team-memory.snapshot.json.zst")
    }

    pub fn reader(&self) -> MemoryReader {
        MemoryReader { state: Arc::clone(&self.state) }
    }

    /// Normalize an agent identifier to a canonical role.
    pub fn normalize_agent(&self, name: &str) -> Result<Role, MemoryError> {
        let lowered = name.to_ascii_lowercase();
        if let Some(role) = self.aliases.get(&lowered) {
            return Ok(*role);
        }
        lowered.parse().map_err(|_| MemoryError::UnknownAlias(name.to_string()))
    }

    fn commit(&mut self, op: MemoryOp) -> Result<(), MemoryError> {
        // WAL first: the log is the fact, state is derived from it.
        self.wal.append(&op)?;
        self.state.lock().apply_op(&op);
        if self.wal.needs_flush() {
            self.wal.flush()?;
        }
        self.ops_since_checkpoint += 1;
        if self.ops_since_checkpoint >= CHECKPOINT_EVERY {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Write a snapshot of the current state and truncate the covered WAL.
    pub fn checkpoint(&mut self) -> Result<(), MemoryError> {
        self.wal.flush()?;
        let covered = self.wal.write_seq();
        let state = self.state.lock().clone();
        Snapshot::new(covered, state).store(&Self::snapshot_path(&self.dir))?;
        self.wal.truncate_before(covered + 1)?;
        self.snapshot_covered_seq = covered;
        self.ops_since_checkpoint = 0;
        Ok(())
    }

    // -- core operations ----------------------------------------------------

    pub fn create_claim(
        &mut self,
        params: CreateClaim,
        now_ms: u64,
    ) -> Result<CreateClaimOutcome, MemoryError> {
        if !(0.0..=1.0).contains(&params.confidence) {
            return Err(MemoryError::InvalidConfidence(params.confidence));
        }
        {
            let state = self.state.lock();
            if let Some(existing) = state.by_idempotency.get(&params.idempotency_key) {
                return Ok(CreateClaimOutcome { claim_id: *existing, deduplicated: true });
            }
            if let Some(superseded) = &params.supersedes {
                if !state.claims.contains_key(superseded) {
                    return Err(MemoryError::ClaimNotFound(*superseded));
                }
            }
        }
        let claim = Claim {
            claim_id: ClaimId::new(),
            idempotency_key: params.idempotency_key,
            statement: params.statement,
            claim_type: params.claim_type,
            owner_role: params.owner_role,
            confidence: params.confidence,
            status: ClaimStatus::Proposed,
            supersedes: params.supersedes,
            session: params.session,
            ttl_hours: params.ttl_hours,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        // Supersession must stay a DAG. The new id cannot be reachable yet,
        // but a corrupt chain would loop; reject rather than loop forever.
        if let Some(superseded) = &claim.supersedes {
            if self.state.lock().supersedes_reaches(superseded, &claim.claim_id) {
                return Err(MemoryError::SupersedesCycle(*superseded));
            }
        }
        let claim_id = claim.claim_id;
        self.commit(MemoryOp::ClaimCreated { claim, scopes: params.scopes })?;
        Ok(CreateClaimOutcome { claim_id, deduplicated: false })
    }

    /// Explicit status change, checked against the state machine.
    pub fn update_claim_status(
        &mut self,
        claim_id: ClaimId,
        next: ClaimStatus,
        changed_by: Role,
        reason: &str,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        let previous = {
            let state = self.state.lock();
            state
                .claims
                .get(&claim_id)
                .map(|c| c.status)
                .ok_or(MemoryError::ClaimNotFound(claim_id))?
        };
        if !previous.can_transition_to(next) {
            return Err(MemoryError::InvalidTransition { claim_id, previous, next });
        }
        self.commit(MemoryOp::StatusChanged {
            change: StatusChange {
                claim_id,
                previous,
                next,
                changed_by,
                reason: reason.to_string(),
                changed_at_ms: now_ms,
            },
        })
    }

    pub fn add_evidence(
        &mut self,
        claim_id: ClaimId,
        evidence_event_ref: &str,
        relation: EvidenceRelation,
        weight: f64,
        added_by: Role,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        if !self.state.lock().claims.contains_key(&claim_id) {
            return Err(MemoryError::ClaimNotFound(claim_id));
        }
        self.commit(MemoryOp::EvidenceAdded {
            evidence: ClaimEvidence {
                claim_id,
                evidence_event_ref: evidence_event_ref.to_string(),
                relation,
                weight,
                added_by,
                added_at_ms: now_ms,
            },
        })
    }

    /// Upsert one agent's position and recompute consensus status.
    ///
    /// Returns the status change applied, if any.
    pub fn record_consensus(
        &mut self,
        claim_id: ClaimId,
        agent: Role,
        position: ConsensusPosition,
        reason: &str,
        now_ms: u64,
    ) -> Result<Option<ClaimStatus>, MemoryError> {
        if !self.state.lock().claims.contains_key(&claim_id) {
            return Err(MemoryError::ClaimNotFound(claim_id));
        }
        self.commit(MemoryOp::ConsensusRecorded {
            claim_id,
            agent,
            position,
            reason: reason.to_string(),
            at_ms: now_ms,
        })?;
        self.recompute_status(claim_id, agent, now_ms)
    }

    /// Apply the consensus-derived status, writing history when it changes.
    fn recompute_status(
        &mut self,
        claim_id: ClaimId,
        changed_by: Role,
        now_ms: u64,
    ) -> Result<Option<ClaimStatus>, MemoryError> {
        let (previous, next) = {
            let state = self.state.lock();
            let claim = state
                .claims
                .get(&claim_id)
                .ok_or(MemoryError::ClaimNotFound(claim_id))?;
            match state.recomputed_status(&claim_id) {
                Some(next) => (claim.status, next),
                None => return Ok(None),
            }
        };
        self.commit(MemoryOp::StatusChanged {
            change: StatusChange {
                claim_id,
                previous,
                next,
                changed_by,
                reason: "consensus recomputation".to_string(),
                changed_at_ms: now_ms,
            },
        })?;
        Ok(Some(next))
    }

    pub fn create_decision(
        &mut self,
        claim_id: ClaimId,
        decided_by: Role,
        rationale: &str,
        alternatives: Vec<String>,
        now_ms: u64,
    ) -> Result<DecisionId, MemoryError> {
        if !self.state.lock().claims.contains_key(&claim_id) {
            return Err(MemoryError::ClaimNotFound(claim_id));
        }
        let decision = Decision {
            decision_id: DecisionId::new(),
            claim_id,
            decided_by,
            rationale: rationale.to_string(),
            alternatives,
            outcome: None,
            outcome_notes: None,
            created_at_ms: now_ms,
        };
        let id = decision.decision_id;
        self.commit(MemoryOp::DecisionCreated { decision })?;
        Ok(id)
    }

    pub fn record_outcome(
        &mut self,
        decision_id: DecisionId,
        outcome: DecisionOutcome,
        notes: Option<String>,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        if !self.state.lock().decisions.contains_key(&decision_id) {
            return Err(MemoryError::DecisionNotFound(decision_id));
        }
        self.commit(MemoryOp::OutcomeRecorded { decision_id, outcome, notes, at_ms: now_ms })
    }

    /// Materialize `agent`'s current belief set and pair it against other
    /// agents' latest snapshots; returns the contradictions detected.
    pub fn create_belief_snapshot(
        &mut self,
        agent: Role,
        session: SessionId,
        now_ms: u64,
    ) -> Result<Vec<Contradiction>, MemoryError> {
        let snapshot = {
            let state = self.state.lock();
            let mut believed = Vec::new();
            let mut rejected = Vec::new();
            for claim in state.claims.values() {
                if claim.status.is_terminal() {
                    continue;
                }
                let position = state
                    .consensus
                    .get(&claim.claim_id)
                    .and_then(|edges| edges.iter().find(|e| e.agent == agent))
                    .map(|e| e.position);
                match position {
                    Some(ConsensusPosition::Support) => believed.push(claim.claim_id),
                    Some(ConsensusPosition::Challenge) => rejected.push(claim.claim_id),
                    Some(ConsensusPosition::Abstain) => {}
                    // Owners implicitly believe their unchallenged claims.
                    None if claim.owner_role == agent => believed.push(claim.claim_id),
                    None => {}
                }
            }
            BeliefSnapshot { agent, session, believed, rejected, taken_at_ms: now_ms }
        };
        self.commit(MemoryOp::SnapshotTaken { snapshot: snapshot.clone() })?;

        let detected = {
            let state = self.state.lock();
            detect_contradictions(&snapshot, &state, session, now_ms)
        };
        for contradiction in &detected {
            self.commit(MemoryOp::ContradictionDetected { contradiction: contradiction.clone() })?;
        }
        Ok(detected)
    }

    pub fn upsert_pattern(&mut self, pattern: troupe_core::Pattern) -> Result<(), MemoryError> {
        self.commit(MemoryOp::PatternUpserted { pattern })
    }

    /// Run the pattern miner over the window ending at `now_ms`,
    /// merging detections into the known pattern set.
    pub fn mine_patterns(&mut self, now_ms: u64) -> Result<Vec<troupe_core::Pattern>, MemoryError> {
        let merged: Vec<troupe_core::Pattern> = {
            let state = self.state.lock();
            patterns::detect(&state, now_ms)
                .into_iter()
                .map(|detection| {
                    let existing = state
                        .patterns
                        .values()
                        .find(|p| p.kind == detection.kind && p.claim_id == detection.claim_id);
                    detection.into_pattern(existing, now_ms)
                })
                .collect()
        };
        for pattern in &merged {
            self.commit(MemoryOp::PatternUpserted { pattern: pattern.clone() })?;
        }
        Ok(merged)
    }

    /// Evaluate every guard against one claim.
    pub fn evaluate_guards(&self, claim_id: &ClaimId, now_ms: u64) -> Vec<patterns::GuardHit> {
        patterns::evaluate_guards(&self.state.lock(), claim_id, now_ms)
    }

    pub fn create_guard(
        &mut self,
        trigger: &str,
        action: GuardAction,
        source_claim: Option<ClaimId>,
        source_pattern: Option<troupe_core::PatternId>,
        now_ms: u64,
    ) -> Result<GuardId, MemoryError> {
        let guard = Guard {
            guard_id: GuardId::new(),
            trigger: trigger.to_string(),
            action,
            source_claim,
            source_pattern,
            created_at_ms: now_ms,
        };
        let id = guard.guard_id;
        self.commit(MemoryOp::GuardCreated { guard })?;
        Ok(id)
    }

    // -- experiments --------------------------------------------------------

    /// Queue an experiment, idempotent on the dedup key.
    pub fn queue_experiment(
        &mut self,
        record: ExperimentRecord,
    ) -> Result<(ExperimentId, bool), MemoryError> {
        if let Some(existing) = self.state.lock().experiments_by_key.get(&record.idempotency_key)
        {
            return Ok((*existing, true));
        }
        let id = record.experiment_id;
        self.commit(MemoryOp::ExperimentQueued { record })?;
        Ok((id, false))
    }

    pub fn set_experiment_status(
        &mut self,
        experiment_id: ExperimentId,
        status: ExperimentStatus,
        exit_code: Option<i32>,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        if !self.state.lock().experiments.contains_key(&experiment_id) {
            return Err(MemoryError::ExperimentNotFound(experiment_id));
        }
        self.commit(MemoryOp::ExperimentStatusChanged { experiment_id, status, exit_code, at_ms: now_ms })
    }

    /// Bind the outcome event, add the claim evidence, and resolve a
    /// `pendingProof` claim via the state machine.
    pub fn attach_experiment(
        &mut self,
        experiment_id: ExperimentId,
        evidence_event_ref: &str,
        now_ms: u64,
    ) -> Result<Option<ClaimStatus>, MemoryError> {
        let (claim_id, relation, succeeded) = {
            let state = self.state.lock();
            let record = state
                .experiments
                .get(&experiment_id)
                .ok_or(MemoryError::ExperimentNotFound(experiment_id))?;
            (
                record.claim_id,
                record.relation.unwrap_or(EvidenceRelation::Supports),
                record.status == ExperimentStatus::Succeeded
                    || (record.status == ExperimentStatus::AttachPending
                        && record.exit_code == Some(0)),
            )
        };
        self.commit(MemoryOp::ExperimentAttached {
            experiment_id,
            evidence_event_ref: evidence_event_ref.to_string(),
            at_ms: now_ms,
        })?;

        let claim_id = match claim_id {
            Some(id) => id,
            None => return Ok(None),
        };
        // A passing run binds with the requested relation; a failing run
        // binds with the opposite polarity.
        let effective = match (succeeded, relation) {
            (true, relation) => relation,
            (false, EvidenceRelation::Supports) => EvidenceRelation::Contradicts,
            (false, other) => other,
        };
        self.add_evidence(
            claim_id,
            evidence_event_ref,
            effective,
            1.0,
            Role::Coordinator,
            now_ms,
        )?;

        let previous = self
            .state
            .lock()
            .claims
            .get(&claim_id)
            .map(|c| c.status)
            .ok_or(MemoryError::ClaimNotFound(claim_id))?;
        if previous != ClaimStatus::PendingProof {
            return Ok(None);
        }
        let next = if effective == EvidenceRelation::Supports {
            ClaimStatus::Confirmed
        } else {
            ClaimStatus::Contested
        };
        self.commit(MemoryOp::StatusChanged {
            change: StatusChange {
                claim_id,
                previous,
                next,
                changed_by: Role::Coordinator,
                reason: format!("experiment {} outcome", experiment_id),
                changed_at_ms: now_ms,
            },
        })?;
        Ok(Some(next))
    }

    /// Verify evidence refs against the ledger; report orphans, delete nothing.
    pub fn integrity_sweep(
        &self,
        ref_exists: impl Fn(&str) -> bool,
    ) -> Vec<OrphanReport> {
        let state = self.state.lock();
        let mut orphans = Vec::new();
        for rows in state.evidence.values() {
            for row in rows {
                if !ref_exists(&row.evidence_event_ref) {
                    orphans.push(OrphanReport {
                        claim_id: row.claim_id,
                        evidence_event_ref: row.evidence_event_ref.clone(),
                    });
                }
            }
        }
        orphans
    }

    /// Apply one spooled op during recovery. Invalid ops are logged and
    /// skipped; idempotency is handled inside `apply_op`.
    pub fn apply_spooled(&mut self, op: MemoryOp) -> Result<(), MemoryError> {
        self.commit(op)
    }

    pub fn flush(&mut self) -> Result<(), MemoryError> {
        Ok(self.wal.flush()?)
    }
}

/// Contradictions between `snapshot` and every other agent's latest snapshot.
fn detect_contradictions(
    snapshot: &BeliefSnapshot,
    state: &MemoryState,
    session: SessionId,
    now_ms: u64,
) -> Vec<Contradiction> {
    let mut detected = Vec::new();
    for (other_agent, other) in &state.snapshots {
        if *other_agent == snapshot.agent {
            continue;
        }
        for claim_id in &snapshot.believed {
            if other.rejected.contains(claim_id) {
                detected.push(canonical(*claim_id, snapshot.agent, *other_agent, session, now_ms));
            }
        }
        for claim_id in &snapshot.rejected {
            if other.believed.contains(claim_id) {
                detected.push(canonical(*claim_id, snapshot.agent, *other_agent, session, now_ms));
            }
        }
    }
    detected
}

/// Canonical ordering of the pair elides the mirrored row.
fn canonical(
    claim_id: ClaimId,
    a: Role,
    b: Role,
    session: SessionId,
    now_ms: u64,
) -> Contradiction {
    let (agent_a, agent_b) = if a.to_string() <= b.to_string() { (a, b) } else { (b, a) };
    Contradiction { claim_id, agent_a, agent_b, session, detected_at_ms: now_ms }
}

/// Concurrent read handle over the materialized state.
#[derive(Clone)]
pub struct MemoryReader {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReader {
    pub fn get_claim(&self, claim_id: &ClaimId) -> Option<Claim> {
        self.state.lock().claims.get(claim_id).cloned()
    }

    pub fn claim_scopes(&self, claim_id: &ClaimId) -> Vec<String> {
        self.state.lock().scopes.get(claim_id).cloned().unwrap_or_default()
    }

    pub fn evidence(&self, claim_id: &ClaimId) -> Vec<ClaimEvidence> {
        self.state.lock().evidence.get(claim_id).cloned().unwrap_or_default()
    }

    pub fn consensus(&self, claim_id: &ClaimId) -> Vec<ConsensusEdge> {
        self.state.lock().consensus.get(claim_id).cloned().unwrap_or_default()
    }

    pub fn status_history(&self, claim_id: &ClaimId) -> Vec<StatusChange> {
        self.state
            .lock()
            .status_history
            .iter()
            .filter(|c| &c.claim_id == claim_id)
            .cloned()
            .collect()
    }

    pub fn get_experiment(&self, id: &ExperimentId) -> Option<ExperimentRecord> {
        self.state.lock().experiments.get(id).cloned()
    }

    pub fn experiments(&self) -> Vec<ExperimentRecord> {
        self.state.lock().experiments.values().cloned().collect()
    }

    pub fn contradictions(&self) -> Vec<Contradiction> {
        self.state.lock().contradictions.clone()
    }

    pub fn guards(&self) -> Vec<Guard> {
        self.state.lock().guards.values().cloned().collect()
    }

    pub fn patterns(&self) -> Vec<troupe_core::Pattern> {
        self.state.lock().patterns.values().cloned().collect()
    }

    /// All evidence refs currently cited (for ledger prune protection).
    pub fn evidence_refs(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .evidence
            .values()
            .flat_map(|rows| rows.iter().map(|r| r.evidence_event_ref.clone()))
            .collect()
    }

    /// Combined query over scopes, attributes, time, and text.
    pub fn query_claims(&self, query: &ClaimQuery) -> Vec<Claim> {
        let state = self.state.lock();
        let text_matches = query.text.as_deref().map(|t| state.text_index.search(t));

        let mut matched: Vec<&Claim> = state
            .claims
            .values()
            .filter(|claim| {
                if let Some(kind) = query.claim_type {
                    if claim.claim_type != kind {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if claim.status != status {
                        return false;
                    }
                }
                if let Some(owner) = query.owner {
                    if claim.owner_role != owner {
                        return false;
                    }
                }
                if let Some(session) = query.session {
                    if claim.session != session {
                        return false;
                    }
                }
                if let Some(since) = query.since_ms {
                    if claim.created_at_ms < since {
                        return false;
                    }
                }
                if let Some(until) = query.until_ms {
                    if claim.created_at_ms > until {
                        return false;
                    }
                }
                if !query.scopes.is_empty() {
                    let claim_scopes = state.scopes.get(&claim.claim_id);
                    let any = claim_scopes
                        .map(|tags| query.scopes.iter().any(|s| tags.contains(s)))
                        .unwrap_or(false);
                    if !any {
                        return false;
                    }
                }
                if let Some(matches) = &text_matches {
                    if !matches.contains(&claim.claim_id) {
                        return false;
                    }
                }
                true
            })
            .collect();

        // Creation order gives the cursor stable semantics.
        matched.sort_by_key(|c| (c.created_at_ms, c.claim_id.as_str().to_string()));
        let start = match &query.cursor {
            Some(cursor) => matched
                .iter()
                .position(|c| &c.claim_id == cursor)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        matched
            .into_iter()
            .skip(start)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
