// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    proposed_confirmed = { ClaimStatus::Proposed, ClaimStatus::Confirmed, true },
    proposed_contested = { ClaimStatus::Proposed, ClaimStatus::Contested, true },
    proposed_deprecated = { ClaimStatus::Proposed, ClaimStatus::Deprecated, true },
    confirmed_contested = { ClaimStatus::Confirmed, ClaimStatus::Contested, true },
    confirmed_deprecated = { ClaimStatus::Confirmed, ClaimStatus::Deprecated, true },
    contested_confirmed = { ClaimStatus::Contested, ClaimStatus::Confirmed, true },
    contested_pending = { ClaimStatus::Contested, ClaimStatus::PendingProof, true },
    pending_confirmed = { ClaimStatus::PendingProof, ClaimStatus::Confirmed, true },
    pending_contested = { ClaimStatus::PendingProof, ClaimStatus::Contested, true },
    proposed_pending = { ClaimStatus::Proposed, ClaimStatus::PendingProof, false },
    confirmed_proposed = { ClaimStatus::Confirmed, ClaimStatus::Proposed, false },
    deprecated_confirmed = { ClaimStatus::Deprecated, ClaimStatus::Confirmed, false },
    deprecated_proposed = { ClaimStatus::Deprecated, ClaimStatus::Proposed, false },
    deprecated_deprecated = { ClaimStatus::Deprecated, ClaimStatus::Deprecated, false },
)]
fn status_machine(from: ClaimStatus, to: ClaimStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn deprecated_is_the_only_terminal_state() {
    for status in [
        ClaimStatus::Proposed,
        ClaimStatus::Confirmed,
        ClaimStatus::Contested,
        ClaimStatus::PendingProof,
    ] {
        assert!(!status.is_terminal());
        // Every live state can be deprecated.
        assert!(status.can_transition_to(ClaimStatus::Deprecated));
    }
    assert!(ClaimStatus::Deprecated.is_terminal());
}

#[test]
fn status_serde_uses_camel_case() {
    assert_eq!(serde_json::to_string(&ClaimStatus::PendingProof).unwrap(), "\"pendingProof\"");
    assert_eq!(ClaimStatus::PendingProof.to_string(), "pendingProof");
}

#[test]
fn experiment_settled_states() {
    assert!(!ExperimentStatus::Queued.is_settled());
    assert!(!ExperimentStatus::Running.is_settled());
    for status in [
        ExperimentStatus::Succeeded,
        ExperimentStatus::Failed,
        ExperimentStatus::TimedOut,
        ExperimentStatus::Canceled,
        ExperimentStatus::AttachPending,
        ExperimentStatus::Attached,
    ] {
        assert!(status.is_settled());
    }
}

#[test]
fn claim_serde_roundtrip() {
    let claim = crate::test_support::claim("utility Y passes unit tests", "k1");
    let json = serde_json::to_string(&claim).unwrap();
    let parsed: Claim = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, claim);
}
