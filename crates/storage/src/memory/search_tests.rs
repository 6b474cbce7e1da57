// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn single_token_match() {
    let mut index = TextIndex::default();
    let id = ClaimId::new();
    index.insert(id, "utility Y passes unit tests");

    assert!(index.search("utility").contains(&id));
    assert!(index.search("UNIT").contains(&id));
    assert!(index.search("absent").is_empty());
}

#[test]
fn all_tokens_must_match() {
    let mut index = TextIndex::default();
    let a = ClaimId::new();
    let b = ClaimId::new();
    index.insert(a, "retry logic works under load");
    index.insert(b, "retry logic is broken");

    let hits = index.search("retry broken");
    assert!(hits.contains(&b));
    assert!(!hits.contains(&a));
}

#[test]
fn punctuation_splits_tokens() {
    let mut index = TextIndex::default();
    let id = ClaimId::new();
    index.insert(id, "pkg/y: tests pass (all 12)");

    assert!(index.search("pkg y").contains(&id));
    assert!(index.search("12").contains(&id));
}

#[test]
fn empty_query_matches_nothing() {
    let mut index = TextIndex::default();
    index.insert(ClaimId::new(), "something");
    assert!(index.search("").is_empty());
    assert!(index.search("   ").is_empty());
}
