// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use troupe_core::{EventSource, FakeClock};

fn origin() -> TransitionOrigin {
    TransitionOrigin {
        actor_type: "module".to_string(),
        role: None,
        source: "delivery-engine".to_string(),
    }
}

fn open(ledger: &TransitionLedger<FakeClock>) -> (TransitionId, CorrelationId) {
    let correlation = CorrelationId::new();
    let id = ledger.open(OpenTransition {
        correlation_id: correlation,
        pane_id: Some(PaneId(1)),
        category: "delivery".to_string(),
        intent_type: "inject".to_string(),
        transition_type: "message".to_string(),
        origin: origin(),
        evidence_spec: EvidenceSpec::default(),
        preconditions: vec![],
    });
    (id, correlation)
}

fn event(kind: EventKind, correlation: CorrelationId) -> LedgerEvent {
    LedgerEvent::new(kind, EventSource::Delivery, correlation)
}

#[test]
fn open_starts_requested() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, _) = open(&ledger);
    assert_eq!(ledger.phase(id).unwrap(), Phase::Requested);
}

#[test]
fn owner_mutations_require_the_lease() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, _) = open(&ledger);
    ledger.advance(id, Phase::Accepted, None, None).unwrap();

    // No lease at all.
    let err = ledger.advance(id, Phase::Applied, None, None).unwrap_err();
    assert!(matches!(err, TransitionError::OwnershipConflict { .. }));

    let lease = ledger.acquire_lease(id, "delivery-engine").unwrap();
    // Wrong lease id.
    let err = ledger.advance(id, Phase::Applied, Some(Uuid::new_v4()), None).unwrap_err();
    assert!(matches!(err, TransitionError::OwnershipConflict { .. }));

    ledger.advance(id, Phase::Applied, Some(lease), None).unwrap();
    assert_eq!(ledger.phase(id).unwrap(), Phase::Applied);
}

#[test]
fn second_module_cannot_take_a_live_lease() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, _) = open(&ledger);
    ledger.acquire_lease(id, "delivery-engine").unwrap();
    let err = ledger.acquire_lease(id, "someone-else").unwrap_err();
    assert!(matches!(err, TransitionError::OwnershipConflict { .. }));
}

#[test]
fn expired_lease_rejects_owner_mutations() {
    let clock = FakeClock::new();
    let ledger = TransitionLedger::new(clock.clone());
    let (id, _) = open(&ledger);
    ledger.advance(id, Phase::Accepted, None, None).unwrap();
    let lease = ledger.acquire_lease(id, "delivery-engine").unwrap();

    clock.advance(Duration::from_millis(15_001));
    let err = ledger.advance(id, Phase::Applied, Some(lease), None).unwrap_err();
    assert_eq!(err, TransitionError::OwnerLeaseExpired);
}

#[test]
fn expired_lease_can_be_stolen() {
    let clock = FakeClock::new();
    let ledger = TransitionLedger::new(clock.clone());
    let (id, _) = open(&ledger);
    ledger.acquire_lease(id, "delivery-engine").unwrap();
    clock.advance(Duration::from_millis(15_001));
    // A new module may claim the lease after expiry.
    ledger.acquire_lease(id, "recovery").unwrap();
}

#[test]
fn illegal_phase_edges_are_rejected() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, _) = open(&ledger);
    let err = ledger.advance(id, Phase::Verified, None, None).unwrap_err();
    assert!(matches!(err, TransitionError::InvalidPhase { .. }));
}

#[test]
fn terminal_phase_freezes_the_record() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, _) = open(&ledger);
    ledger.advance(id, Phase::Dropped, None, Some("ttl")).unwrap();
    let err = ledger.advance(id, Phase::Accepted, None, None).unwrap_err();
    assert!(matches!(err, TransitionError::Closed(_)));
    assert!(ledger.get(id).unwrap().closed);
}

#[test]
fn events_join_by_correlation_with_classification() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, correlation) = open(&ledger);

    ledger.record_event(&event(EventKind::DaemonWriteAck, correlation), false);
    ledger.record_event(&event(EventKind::VerifyPass, correlation), false);
    // Unrelated correlation: ignored.
    ledger.record_event(&event(EventKind::VerifyPass, CorrelationId::new()), false);

    let transition = ledger.get(id).unwrap();
    assert_eq!(transition.evidence.len(), 2);
    assert_eq!(transition.observed_class(), EvidenceClass::Strong);
}

#[test]
fn pane_output_during_confirmed_compaction_is_disallowed() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, correlation) = open(&ledger);
    ledger.record_event(&event(EventKind::PtyDataReceived, correlation), true);
    assert_eq!(ledger.get(id).unwrap().observed_class(), EvidenceClass::Disallowed);
}

#[test]
fn finalize_policy() {
    let clock = FakeClock::new();

    // Strong evidence → verified.
    let ledger = TransitionLedger::new(clock.clone());
    let (id, correlation) = open(&ledger);
    let lease = ledger.acquire_lease(id, "delivery-engine").unwrap();
    ledger.advance(id, Phase::Accepted, None, None).unwrap();
    ledger.advance(id, Phase::Applied, Some(lease), None).unwrap();
    ledger.record_event(&event(EventKind::VerifyPass, correlation), false);
    assert_eq!(ledger.finalize(id, Some(lease)).unwrap(), TransitionOutcome::Verified);
    assert_eq!(ledger.phase(id).unwrap(), Phase::Verified);

    // Disallowed present → failed, regardless of strong.
    let (id, correlation) = open(&ledger);
    let lease = ledger.acquire_lease(id, "delivery-engine").unwrap();
    ledger.advance(id, Phase::Accepted, None, None).unwrap();
    ledger.advance(id, Phase::Applied, Some(lease), None).unwrap();
    ledger.record_event(&event(EventKind::VerifyPass, correlation), false);
    ledger.record_event(&event(EventKind::PtyDataReceived, correlation), true);
    assert_eq!(ledger.finalize(id, Some(lease)).unwrap(), TransitionOutcome::Failed);

    // Weak only, weak allowed → riskedPass.
    let (id, correlation) = open(&ledger);
    let lease = ledger.acquire_lease(id, "delivery-engine").unwrap();
    {
        let mut spec = EvidenceSpec::default();
        spec.required_class = EvidenceClass::Weak;
        // Re-open with a weak-allowing spec.
        let weak_id = ledger.open(OpenTransition {
            correlation_id: correlation,
            pane_id: None,
            category: "delivery".to_string(),
            intent_type: "inject".to_string(),
            transition_type: "message".to_string(),
            origin: origin(),
            evidence_spec: spec,
            preconditions: vec![],
        });
        let weak_lease = ledger.acquire_lease(weak_id, "delivery-engine").unwrap();
        ledger.advance(weak_id, Phase::Accepted, None, None).unwrap();
        ledger.advance(weak_id, Phase::Applied, Some(weak_lease), None).unwrap();
        ledger.record_event(&event(EventKind::DaemonWriteAck, correlation), false);
        assert_eq!(
            ledger.finalize(weak_id, Some(weak_lease)).unwrap(),
            TransitionOutcome::RiskedPass
        );
    }

    // No evidence → timed out.
    ledger.advance(id, Phase::Accepted, None, None).unwrap();
    ledger.advance(id, Phase::Applied, Some(lease), None).unwrap();
    assert_eq!(ledger.finalize(id, Some(lease)).unwrap(), TransitionOutcome::TimedOut);
}

#[test]
fn ring_evicts_oldest_closed_never_open() {
    let ledger = TransitionLedger::new(FakeClock::new());
    // Fill the ring with closed transitions.
    for _ in 0..500 {
        let (id, _) = open(&ledger);
        ledger.advance(id, Phase::Dropped, None, None).unwrap();
    }
    assert_eq!(ledger.len(), 500);

    // One open transition stays open across further churn.
    let (kept, _) = open(&ledger);
    assert_eq!(ledger.len(), 500);
    for _ in 0..600 {
        let (id, _) = open(&ledger);
        ledger.advance(id, Phase::Dropped, None, None).unwrap();
    }
    assert_eq!(ledger.len(), 500);
    assert!(ledger.get(kept).is_some());
    assert!(!ledger.get(kept).unwrap().closed);
}

#[test]
fn phase_history_records_every_change() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, _) = open(&ledger);
    let lease = ledger.acquire_lease(id, "delivery-engine").unwrap();
    ledger.advance(id, Phase::Accepted, None, None).unwrap();
    ledger.advance(id, Phase::Applied, Some(lease), None).unwrap();
    ledger.advance(id, Phase::Verifying, Some(lease), None).unwrap();
    ledger.advance(id, Phase::Verified, Some(lease), None).unwrap();

    let transition = ledger.get(id).unwrap();
    let phases: Vec<(Phase, Phase)> =
        transition.phase_history.iter().map(|c| (c.from, c.to)).collect();
    assert_eq!(
        phases,
        vec![
            (Phase::Requested, Phase::Accepted),
            (Phase::Accepted, Phase::Applied),
            (Phase::Applied, Phase::Verifying),
            (Phase::Verifying, Phase::Verified),
        ]
    );
}

#[test]
fn find_open_matches_latest_by_correlation() {
    let ledger = TransitionLedger::new(FakeClock::new());
    let (id, correlation) = open(&ledger);
    assert_eq!(ledger.find_open(&correlation).unwrap().transition_id, id);
    ledger.advance(id, Phase::Dropped, None, None).unwrap();
    assert!(ledger.find_open(&correlation).is_none());
}
