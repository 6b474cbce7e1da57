// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    fresh_output = { true, 0, 0, PaneHealth::Healthy },
    idle_under_limit = { true, 29_999, 0, PaneHealth::Healthy },
    idle_over_limit = { true, 30_001, 0, PaneHealth::Stale },
    idle_with_write_failures = { true, 30_001, 3, PaneHealth::Stuck },
    failures_but_active = { true, 100, 10, PaneHealth::Healthy },
    process_gone = { false, 0, 0, PaneHealth::Dead },
    dead_beats_stuck = { false, 99_999, 99, PaneHealth::Dead },
)]
fn classification(alive: bool, idle_ms: u64, failed_writes: u64, expected: PaneHealth) {
    assert_eq!(classify(alive, idle_ms, failed_writes), expected);
}

#[test]
fn current_process_is_alive() {
    assert!(is_process_alive(std::process::id()));
}

#[test]
fn absurd_pid_is_not_alive() {
    assert!(!is_process_alive(u32::MAX));
}
