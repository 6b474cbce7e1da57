// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use troupe_core::outcome::DropReason;

#[test]
fn delivered_outcomes_exit_zero() {
    assert_eq!(exit_code_for(&DeliveryOutcome::DeliveredVerified), 0);
    assert_eq!(exit_code_for(&DeliveryOutcome::DeliveredRisked), 0);
    assert_eq!(exit_code_for(&DeliveryOutcome::FallbackTriggered), 0);
}

#[test]
fn dropped_and_unverified_exit_one() {
    assert_eq!(exit_code_for(&DeliveryOutcome::Dropped(DropReason::Duplicate)), 1);
    assert_eq!(exit_code_for(&DeliveryOutcome::Dropped(DropReason::Ttl)), 1);
    assert_eq!(exit_code_for(&DeliveryOutcome::AcceptedUnverified), 1);
}

#[test]
fn invalid_input_is_exit_two() {
    assert_eq!(ExitError::invalid_input("bad").code, 2);
    assert_eq!(ExitError::failure("broken").code, 1);
}
