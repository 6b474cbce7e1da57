// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;
use tempfile::tempdir;
use troupe_core::claim::ClaimType;
use troupe_core::{ConsensusPosition, EvidenceRelation, ExperimentRecord, ExperimentStatus, Role};

fn open(dir: &std::path::Path) -> TeamMemory {
    TeamMemory::open(dir, HashMap::new()).unwrap()
}

fn params(statement: &str, key: &str) -> CreateClaim {
    CreateClaim {
        statement: statement.to_string(),
        claim_type: ClaimType::Fact,
        owner_role: Role::Builder,
        scopes: vec!["pkg/y".to_string()],
        confidence: 0.8,
        session: SessionId::from("ssn-test"),
        ttl_hours: None,
        supersedes: None,
        idempotency_key: key.to_string(),
    }
}

#[test]
fn create_claim_is_idempotent_on_key() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());

    let first = memory.create_claim(params("utility Y passes unit tests", "k1"), 100).unwrap();
    assert!(!first.deduplicated);

    let second = memory.create_claim(params("utility Y passes unit tests", "k1"), 200).unwrap();
    assert!(second.deduplicated);
    assert_eq!(second.claim_id, first.claim_id);

    // Written only once.
    assert_eq!(memory.reader().query_claims(&ClaimQuery::default()).len(), 1);
}

#[test]
fn invalid_confidence_is_rejected() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let mut p = params("x", "k1");
    p.confidence = 1.5;
    assert!(matches!(memory.create_claim(p, 0), Err(MemoryError::InvalidConfidence(_))));
}

#[test]
fn status_machine_is_enforced() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let claim = memory.create_claim(params("x", "k1"), 0).unwrap().claim_id;

    // proposed -> pendingProof is not a legal edge.
    let err = memory
        .update_claim_status(claim, ClaimStatus::PendingProof, Role::Coordinator, "test", 1)
        .unwrap_err();
    assert!(matches!(err, MemoryError::InvalidTransition { .. }));

    memory
        .update_claim_status(claim, ClaimStatus::Deprecated, Role::Coordinator, "stale", 2)
        .unwrap();
    // Terminal: nothing leaves deprecated.
    let err = memory
        .update_claim_status(claim, ClaimStatus::Confirmed, Role::Coordinator, "revive", 3)
        .unwrap_err();
    assert!(matches!(err, MemoryError::InvalidTransition { .. }));
}

#[test]
fn every_transition_writes_history() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let claim = memory.create_claim(params("x", "k1"), 0).unwrap().claim_id;

    memory.record_consensus(claim, Role::Oracle, ConsensusPosition::Support, "lgtm", 10).unwrap();
    let history = memory.reader().status_history(&claim);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous, ClaimStatus::Proposed);
    assert_eq!(history[0].next, ClaimStatus::Confirmed);
    assert_eq!(history[0].changed_by, Role::Oracle);
}

#[test]
fn consensus_support_confirms_and_challenge_contests() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let claim = memory.create_claim(params("x", "k1"), 0).unwrap().claim_id;

    let changed = memory
        .record_consensus(claim, Role::Oracle, ConsensusPosition::Support, "verified", 10)
        .unwrap();
    assert_eq!(changed, Some(ClaimStatus::Confirmed));

    let changed = memory
        .record_consensus(claim, Role::Coordinator, ConsensusPosition::Challenge, "CI failed", 20)
        .unwrap();
    assert_eq!(changed, Some(ClaimStatus::Contested));

    // Challenge withdrawn: back to confirmed.
    let changed = memory
        .record_consensus(claim, Role::Coordinator, ConsensusPosition::Abstain, "retracted", 30)
        .unwrap();
    assert_eq!(changed, Some(ClaimStatus::Confirmed));
}

#[test]
fn consensus_is_upsert_per_agent() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let claim = memory.create_claim(params("x", "k1"), 0).unwrap().claim_id;

    memory.record_consensus(claim, Role::Oracle, ConsensusPosition::Support, "a", 10).unwrap();
    memory.record_consensus(claim, Role::Oracle, ConsensusPosition::Support, "a", 20).unwrap();

    let edges = memory.reader().consensus(&claim);
    assert_eq!(edges.len(), 1);
    // Identical re-record: exactly one history row (status changed once).
    assert_eq!(memory.reader().status_history(&claim).len(), 1);
}

#[test]
fn supersedes_must_exist() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let mut p = params("new knowledge", "k2");
    p.supersedes = Some(ClaimId::new());
    assert!(matches!(memory.create_claim(p, 0), Err(MemoryError::ClaimNotFound(_))));
}

#[test]
fn evidence_requires_live_claim_and_sweep_reports_orphans() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let claim = memory.create_claim(params("x", "k1"), 0).unwrap().claim_id;

    memory
        .add_evidence(claim, "evt:1111", EvidenceRelation::Supports, 1.0, Role::Oracle, 10)
        .unwrap();
    memory
        .add_evidence(claim, "evt:2222", EvidenceRelation::Contradicts, 1.0, Role::Oracle, 11)
        .unwrap();

    let orphans = memory.integrity_sweep(|r| r == "evt:1111");
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].evidence_event_ref, "evt:2222");
    // Reporting does not delete.
    assert_eq!(memory.reader().evidence(&claim).len(), 2);
}

#[test]
fn belief_snapshots_detect_contradictions_once() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let claim = memory.create_claim(params("x", "k1"), 0).unwrap().claim_id;

    memory.record_consensus(claim, Role::Builder, ConsensusPosition::Support, "works", 1).unwrap();
    memory.record_consensus(claim, Role::Oracle, ConsensusPosition::Challenge, "nope", 2).unwrap();

    memory.create_belief_snapshot(Role::Builder, SessionId::from("ssn-test"), 10).unwrap();
    let detected = memory
        .create_belief_snapshot(Role::Oracle, SessionId::from("ssn-test"), 20)
        .unwrap();
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0].claim_id, claim);
    // Canonical ordering: builder < oracle.
    assert_eq!(detected[0].agent_a, Role::Builder);
    assert_eq!(detected[0].agent_b, Role::Oracle);

    // Re-snapshot: the pair is already recorded, state holds one row.
    memory.create_belief_snapshot(Role::Oracle, SessionId::from("ssn-test"), 30).unwrap();
    assert_eq!(memory.reader().contradictions().len(), 1);
}

#[test]
fn query_combines_scope_status_and_text() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());

    memory.create_claim(params("retry logic works", "k1"), 10).unwrap();
    let mut p2 = params("retry logic broken on windows", "k2");
    p2.scopes = vec!["pkg/z".to_string()];
    memory.create_claim(p2, 20).unwrap();

    let hits = memory.reader().query_claims(&ClaimQuery {
        scopes: vec!["pkg/z".to_string()],
        text: Some("retry".to_string()),
        ..Default::default()
    });
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].statement, "retry logic broken on windows");

    let none = memory.reader().query_claims(&ClaimQuery {
        status: Some(ClaimStatus::Confirmed),
        ..Default::default()
    });
    assert!(none.is_empty());
}

#[test]
fn query_cursor_pages_in_creation_order() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let a = memory.create_claim(params("first", "k1"), 10).unwrap().claim_id;
    let b = memory.create_claim(params("second", "k2"), 20).unwrap().claim_id;
    let c = memory.create_claim(params("third", "k3"), 30).unwrap().claim_id;

    let page1 = memory
        .reader()
        .query_claims(&ClaimQuery { limit: Some(2), ..Default::default() });
    assert_eq!(page1.iter().map(|c| c.claim_id).collect::<Vec<_>>(), vec![a, b]);

    let page2 = memory.reader().query_claims(&ClaimQuery {
        limit: Some(2),
        cursor: Some(b),
        ..Default::default()
    });
    assert_eq!(page2.iter().map(|c| c.claim_id).collect::<Vec<_>>(), vec![c]);
}

#[test]
fn alias_normalization() {
    let dir = tempdir().unwrap();
    let mut aliases = HashMap::new();
    aliases.insert("the-brain".to_string(), Role::Oracle);
    let memory = TeamMemory::open(dir.path(), aliases).unwrap();

    assert_eq!(memory.normalize_agent("COORD").unwrap(), Role::Coordinator);
    assert_eq!(memory.normalize_agent("The-Brain").unwrap(), Role::Oracle);
    assert!(matches!(memory.normalize_agent("nobody"), Err(MemoryError::UnknownAlias(_))));
}

#[test]
fn reopen_replays_wal_and_checkpoint_truncates() {
    let dir = tempdir().unwrap();
    let claim_id;
    {
        let mut memory = open(dir.path());
        claim_id = memory.create_claim(params("persisted", "k1"), 10).unwrap().claim_id;
        memory.record_consensus(claim_id, Role::Oracle, ConsensusPosition::Support, "y", 20).unwrap();
        memory.checkpoint().unwrap();
        // Post-checkpoint write lands in the WAL tail.
        memory
            .add_evidence(claim_id, "evt:1", EvidenceRelation::Supports, 1.0, Role::Oracle, 30)
            .unwrap();
        memory.flush().unwrap();
    }
    let memory = open(dir.path());
    let claim = memory.reader().get_claim(&claim_id).unwrap();
    assert_eq!(claim.status, ClaimStatus::Confirmed);
    assert_eq!(memory.reader().evidence(&claim_id).len(), 1);
}

#[test]
fn ttl_expiry_is_reported() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let mut p = params("short lived", "k1");
    p.ttl_hours = Some(1);
    let claim = memory.create_claim(p, 0).unwrap().claim_id;

    let expired = memory.state.lock().expired_claims(3_600_001);
    assert_eq!(expired, vec![claim]);
    assert!(memory.state.lock().expired_claims(3_599_999).is_empty());
}

mod experiments {
    use super::*;

    fn record(key: &str, claim_id: Option<ClaimId>) -> ExperimentRecord {
        ExperimentRecord {
            experiment_id: troupe_core::ExperimentId::new(),
            profile: "test-suite".to_string(),
            args: HashMap::from([("path".to_string(), "pkg/y".to_string())]),
            claim_id,
            relation: Some(EvidenceRelation::Supports),
            requested_by: Role::Coordinator,
            status: ExperimentStatus::Queued,
            idempotency_key: key.to_string(),
            repository_revision: "abc123".to_string(),
            run_dir: None,
            exit_code: None,
            evidence_event_ref: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn queue_is_idempotent_on_key() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());

        let (first, deduped) = memory.queue_experiment(record("key-1", None)).unwrap();
        assert!(!deduped);
        let (second, deduped) = memory.queue_experiment(record("key-1", None)).unwrap();
        assert!(deduped);
        assert_eq!(first, second);
    }

    #[test]
    fn passing_run_confirms_pending_proof_claim() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());
        let claim = memory.create_claim(params("utility Y passes unit tests", "k1"), 0).unwrap().claim_id;

        // Contested, then gated on proof.
        memory
            .record_consensus(claim, Role::Coordinator, ConsensusPosition::Challenge, "last CI failed", 1)
            .unwrap();
        memory
            .update_claim_status(claim, ClaimStatus::PendingProof, Role::Coordinator, "experiment queued", 2)
            .unwrap();

        let (experiment, _) = memory.queue_experiment(record("key-1", Some(claim))).unwrap();
        memory.set_experiment_status(experiment, ExperimentStatus::Running, None, 3).unwrap();
        memory.set_experiment_status(experiment, ExperimentStatus::Succeeded, Some(0), 4).unwrap();

        let status = memory.attach_experiment(experiment, "evt:outcome", 5).unwrap();
        assert_eq!(status, Some(ClaimStatus::Confirmed));

        let rows = memory.reader().evidence(&claim);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].relation, EvidenceRelation::Supports);
        assert_eq!(
            memory.reader().get_experiment(&experiment).unwrap().status,
            ExperimentStatus::Attached
        );
    }

    #[test]
    fn failing_run_binds_contradicts_and_contests() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());
        let claim = memory.create_claim(params("utility Y passes unit tests", "k1"), 0).unwrap().claim_id;

        memory
            .record_consensus(claim, Role::Coordinator, ConsensusPosition::Challenge, "flaky", 1)
            .unwrap();
        memory
            .update_claim_status(claim, ClaimStatus::PendingProof, Role::Coordinator, "proof", 2)
            .unwrap();

        let (experiment, _) = memory.queue_experiment(record("key-2", Some(claim))).unwrap();
        memory.set_experiment_status(experiment, ExperimentStatus::Failed, Some(1), 3).unwrap();

        let status = memory.attach_experiment(experiment, "evt:outcome", 4).unwrap();
        assert_eq!(status, Some(ClaimStatus::Contested));
        let rows = memory.reader().evidence(&claim);
        assert_eq!(rows[0].relation, EvidenceRelation::Contradicts);
    }
}

mod writer_worker {
    use super::*;

    #[tokio::test]
    async fn create_and_consensus_through_worker() {
        let dir = tempdir().unwrap();
        let memory = open(dir.path());
        let spool_path = dir.path().join("team-memory-spool.log");
        let (handle, reader, _task) = spawn_memory_writer(memory, &spool_path);

        let outcome = handle.create_claim(params("via worker", "k1"), 10).await.unwrap();
        assert!(!outcome.deduplicated);

        let changed = handle
            .record_consensus(outcome.claim_id, Role::Oracle, ConsensusPosition::Support, "ok", 20)
            .await
            .unwrap();
        assert_eq!(changed, Some(ClaimStatus::Confirmed));
        assert_eq!(reader.get_claim(&outcome.claim_id).unwrap().status, ClaimStatus::Confirmed);
    }

    #[tokio::test]
    async fn with_store_runs_inside_writer() {
        let dir = tempdir().unwrap();
        let memory = open(dir.path());
        let (handle, reader, _task) =
            spawn_memory_writer(memory, &dir.path().join("spool.log"));

        let claim_id = handle
            .with_store(|store| store.create_claim(params("closure", "k9"), 1).map(|o| o.claim_id))
            .await
            .unwrap()
            .unwrap();
        assert!(reader.get_claim(&claim_id).is_some());
    }
}
