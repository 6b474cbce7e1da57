// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn outcome_string_roundtrip() {
    let outcomes = [
        DeliveryOutcome::DeliveredVerified,
        DeliveryOutcome::DeliveredRisked,
        DeliveryOutcome::AcceptedUnverified,
        DeliveryOutcome::FallbackTriggered,
        DeliveryOutcome::Dropped(DropReason::Duplicate),
        DeliveryOutcome::Dropped(DropReason::QueueFull),
        DeliveryOutcome::Dropped(DropReason::Ttl),
    ];
    for outcome in outcomes {
        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: DeliveryOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}

#[test]
fn dropped_serializes_with_reason() {
    assert_eq!(
        DeliveryOutcome::Dropped(DropReason::Duplicate).to_string(),
        "dropped.duplicate"
    );
    assert_eq!(DeliveryOutcome::DeliveredVerified.to_string(), "delivered.verified");
}

#[test]
fn delivered_includes_fallback() {
    assert!(DeliveryOutcome::DeliveredVerified.is_delivered());
    assert!(DeliveryOutcome::FallbackTriggered.is_delivered());
    assert!(!DeliveryOutcome::Dropped(DropReason::Ttl).is_delivered());
    assert!(!DeliveryOutcome::AcceptedUnverified.is_delivered());
}

#[test]
fn severity_orders_worst_last() {
    let mut outcomes = vec![
        DeliveryOutcome::Dropped(DropReason::Ttl),
        DeliveryOutcome::DeliveredVerified,
        DeliveryOutcome::FallbackTriggered,
        DeliveryOutcome::DeliveredRisked,
    ];
    outcomes.sort_by_key(|o| o.severity());
    assert_eq!(outcomes[0], DeliveryOutcome::DeliveredVerified);
    assert_eq!(outcomes[3], DeliveryOutcome::Dropped(DropReason::Ttl));
}

#[test]
fn error_kind_strings() {
    assert_eq!(ErrorKind::OwnerBindingViolation.as_str(), "owner_binding_violation");
    assert_eq!(ErrorKind::CapacityReached.as_str(), "capacity_reached");
    assert_eq!(ErrorKind::CompactionInProgress.as_str(), "compaction_in_progress");
}
