// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn starts_in_none() {
    let detector = CompactionDetector::new();
    assert_eq!(detector.state(), CompactionState::None);
    assert!(!detector.defers_inject());
    assert!(!detector.degrades_verification());
}

#[test]
fn lexical_marker_suspects_immediately_and_confirms_when_sustained() {
    let mut detector = CompactionDetector::new();

    let state = detector.observe_output(Some("Compacting conversation..."), 30, 1_000);
    assert_eq!(state, CompactionState::Suspected);
    // Suspected degrades verification but does not defer.
    assert!(detector.degrades_verification());
    assert!(!detector.defers_inject());

    // Sustained lexical evidence past the confirm threshold.
    let state = detector.observe_output(Some("Compacting conversation..."), 30, 1_900);
    assert_eq!(state, CompactionState::Confirmed);
    assert!(detector.defers_inject());
}

#[test]
fn repeated_structure_burst_promotes_without_recent_injection() {
    let mut detector = CompactionDetector::new();

    // Near-identical chunk lengths in a tight cadence.
    let mut now = 10_000;
    detector.observe_output(None, 100, now);
    for _ in 0..10 {
        now += 100;
        detector.observe_output(None, 102, now);
    }
    assert_eq!(detector.state(), CompactionState::Confirmed);
}

#[test]
fn recent_injection_suppresses_burst_promotion() {
    let mut detector = CompactionDetector::new();
    detector.note_injection(10_000);

    let mut now = 10_050;
    detector.observe_output(None, 100, now);
    for _ in 0..10 {
        now += 100;
        detector.observe_output(None, 101, now);
    }
    // The output burst is explained by the injection.
    assert_eq!(detector.state(), CompactionState::None);
}

#[test]
fn cooldown_then_none_after_quiet() {
    let mut detector = CompactionDetector::new();
    detector.observe_output(Some("Compacting conversation"), 30, 1_000);
    detector.observe_output(Some("Compacting conversation"), 30, 1_900);
    assert_eq!(detector.state(), CompactionState::Confirmed);

    // Quiet for the cooldown window.
    assert_eq!(detector.tick(3_500), CompactionState::Cooldown);
    assert!(!detector.defers_inject());
    // And quiet again: back to none.
    assert_eq!(detector.tick(5_000), CompactionState::None);
}

#[test]
fn explicit_end_moves_to_cooldown() {
    let mut detector = CompactionDetector::new();
    detector.observe_output(Some("Compacting conversation"), 30, 1_000);
    detector.observe_output(Some("Compacting conversation"), 30, 1_900);
    assert!(detector.defers_inject());

    detector.end(2_000);
    assert_eq!(detector.state(), CompactionState::Cooldown);
    assert!(!detector.defers_inject());
}

#[test]
fn isolated_chunks_never_promote() {
    let mut detector = CompactionDetector::new();
    // Chunks far apart in time with varied sizes.
    detector.observe_output(None, 50, 1_000);
    detector.observe_output(None, 400, 5_000);
    detector.observe_output(None, 20, 9_000);
    assert_eq!(detector.state(), CompactionState::None);
}
