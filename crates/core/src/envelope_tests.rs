// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support;

#[test]
fn fingerprint_is_stable() {
    let a = test_support::envelope("build module X", 1);
    let mut b = a.clone();
    b.message_id = MessageId::new();
    b.created_at_ms = 9_999;
    // Identity fields only: message id and timestamps don't participate.
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn fingerprint_changes_with_body() {
    let a = test_support::envelope("build module X", 1);
    let b = test_support::envelope("build module Y", 1);
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn fingerprint_changes_with_sequence() {
    let a = test_support::envelope("build module X", 1);
    let b = test_support::envelope("build module X", 2);
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn printed_prefix_shape() {
    let env = test_support::envelope("build module X", 3);
    assert_eq!(env.printed_prefix(), "(COORD #3): ");
    assert_eq!(env.printed_line(), "(COORD #3): build module X");
}

#[test]
fn parse_printed_prefix_roundtrip() {
    let (tag, seq, rest) = parse_printed_prefix("(COORD #3): build module X").unwrap();
    assert_eq!(tag, "COORD");
    assert_eq!(seq, 3);
    assert_eq!(rest, "build module X");
}

#[test]
fn parse_printed_prefix_rejects_malformed() {
    assert!(parse_printed_prefix("no prefix here").is_none());
    assert!(parse_printed_prefix("(COORD 3): x").is_none());
    assert!(parse_printed_prefix("(COORD #x): x").is_none());
    assert!(parse_printed_prefix("( #1): x").is_none());
}

#[test]
fn priority_serde_kebab() {
    assert_eq!(serde_json::to_string(&PriorityTag::AckRequired).unwrap(), "\"ack-required\"");
    assert!(PriorityTag::Urgent.is_recovery());
    assert!(!PriorityTag::Task.is_recovery());
}
