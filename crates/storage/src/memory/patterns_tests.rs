// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;
use tempfile::tempdir;

use troupe_core::claim::{ClaimType, GuardAction};
use troupe_core::{ConsensusPosition, Role, SessionId};

use crate::memory::{ClaimQuery, CreateClaim, TeamMemory};

fn open(dir: &std::path::Path) -> TeamMemory {
    TeamMemory::open(dir, HashMap::new()).unwrap()
}

fn claim(memory: &mut TeamMemory, statement: &str, key: &str, at_ms: u64) -> ClaimId {
    memory
        .create_claim(
            CreateClaim {
                statement: statement.to_string(),
                claim_type: ClaimType::Fact,
                owner_role: Role::Builder,
                scopes: vec![],
                confidence: 0.8,
                session: SessionId::from("ssn-test"),
                ttl_hours: None,
                supersedes: None,
                idempotency_key: key.to_string(),
            },
            at_ms,
        )
        .unwrap()
        .claim_id
}

#[test]
fn decay_halves_per_half_life() {
    assert!((decay(0, 0) - 1.0).abs() < 1e-9);
    let half = decay(2 * 60 * 60 * 1000, 0);
    assert!((half - 0.5).abs() < 1e-9);
    assert!(decay(8 * 60 * 60 * 1000, 0) < 0.1);
}

#[test]
fn handoff_loop_detected_after_repeated_flips() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let id = claim(&mut memory, "flappy", "k1", 0);

    // Bounce the claim between contested and confirmed.
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "no", 1_000).unwrap();
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Support, "ok", 2_000).unwrap();
    memory.record_consensus(id, Role::Coordinator, ConsensusPosition::Challenge, "no", 3_000).unwrap();
    memory.record_consensus(id, Role::Coordinator, ConsensusPosition::Support, "ok", 4_000).unwrap();
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "no", 5_000).unwrap();
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Support, "ok", 6_000).unwrap();

    let mined = memory.mine_patterns(10_000).unwrap();
    assert!(mined.iter().any(|p| p.kind == PatternKind::HandoffLoop && p.claim_id == Some(id)));
}

#[test]
fn stall_detected_for_old_contested_claims() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let id = claim(&mut memory, "stuck work", "k1", 0);
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "unresolved", 1_000).unwrap();

    // Within the stall age: nothing.
    assert!(memory.mine_patterns(30 * 60 * 1000).unwrap().is_empty());

    // Past an hour with no movement: stall.
    let mined = memory.mine_patterns(2 * 60 * 60 * 1000).unwrap();
    assert!(mined.iter().any(|p| p.kind == PatternKind::Stall && p.claim_id == Some(id)));
}

#[test]
fn escalation_spiral_counts_one_agents_challenges() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    for i in 0..3 {
        let id = claim(&mut memory, &format!("claim {i}"), &format!("k{i}"), 0);
        memory
            .record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "wrong", 1_000 + i)
            .unwrap();
    }
    let mined = memory.mine_patterns(10_000).unwrap();
    assert!(mined.iter().any(|p| p.kind == PatternKind::EscalationSpiral));
}

#[test]
fn remining_updates_the_existing_pattern_row() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let id = claim(&mut memory, "stuck", "k1", 0);
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "no", 1_000).unwrap();

    let first = memory.mine_patterns(2 * 60 * 60 * 1000).unwrap();
    let second = memory.mine_patterns(3 * 60 * 60 * 1000).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    // Same identity, not a second row.
    assert_eq!(first[0].pattern_id, second[0].pattern_id);
    assert_eq!(memory.reader().patterns().len(), 1);
}

#[test]
fn risk_decays_between_minings() {
    let dir = tempdir().unwrap();
    let mut memory = open(dir.path());
    let id = claim(&mut memory, "stuck", "k1", 0);
    memory.record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "no", 1_000).unwrap();

    let fresh = memory.mine_patterns(2 * 60 * 60 * 1000).unwrap();
    let later = memory.mine_patterns(12 * 60 * 60 * 1000).unwrap();
    assert!(later[0].risk_score < fresh[0].risk_score);
}

mod guards {
    use super::*;

    #[test]
    fn trigger_matches_contested_with_challenges() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());
        let id = claim(&mut memory, "disputed", "k1", 0);
        memory
            .create_guard("status == contested && challenges >= 2", GuardAction::Escalate, None, None, 0)
            .unwrap();

        memory.record_consensus(id, Role::Oracle, ConsensusPosition::Challenge, "a", 1).unwrap();
        assert!(memory.evaluate_guards(&id, 10).is_empty(), "one challenge is not enough");

        memory
            .record_consensus(id, Role::Coordinator, ConsensusPosition::Challenge, "b", 2)
            .unwrap();
        let hits = memory.evaluate_guards(&id, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].action, GuardAction::Escalate);
    }

    #[test]
    fn claim_scoped_guard_only_fires_for_its_claim() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());
        let watched = claim(&mut memory, "watched", "k1", 0);
        let other = claim(&mut memory, "other", "k2", 0);
        memory
            .create_guard("status == proposed", GuardAction::Warn, Some(watched), None, 0)
            .unwrap();

        assert_eq!(memory.evaluate_guards(&watched, 10).len(), 1);
        assert!(memory.evaluate_guards(&other, 10).is_empty());
    }

    #[test]
    fn confidence_and_risk_clauses() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());
        let id = claim(&mut memory, "shaky", "k1", 0);
        memory.create_guard("confidence <= 0.9", GuardAction::Warn, None, None, 0).unwrap();
        assert_eq!(memory.evaluate_guards(&id, 10).len(), 1);

        // Risk starts at zero: a risk guard stays quiet.
        memory.create_guard("risk >= 0.5", GuardAction::Escalate, None, None, 0).unwrap();
        assert_eq!(memory.evaluate_guards(&id, 10).len(), 1);
    }

    #[test]
    fn malformed_triggers_never_fire() {
        let dir = tempdir().unwrap();
        let mut memory = open(dir.path());
        let id = claim(&mut memory, "x", "k1", 0);
        memory.create_guard("nonsense ~~ wat", GuardAction::Warn, None, None, 0).unwrap();
        memory.create_guard("status", GuardAction::Warn, None, None, 0).unwrap();
        assert!(memory.evaluate_guards(&id, 10).is_empty());
    }

    #[test]
    fn unknown_claim_has_no_hits() {
        let dir = tempdir().unwrap();
        let memory = open(dir.path());
        assert!(memory.evaluate_guards(&ClaimId::new(), 10).is_empty());
    }
}
