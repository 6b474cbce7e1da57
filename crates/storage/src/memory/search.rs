// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inverted-index text search over claim statements.
//!
//! Tokens are lowercase alphanumeric runs. A query matches when every
//! query token appears in the statement (AND semantics). At fleet scale
//! (≤ a few thousand claims) this comfortably meets the p95 < 50 ms
//! target without an external search dependency.

use std::collections::{HashMap, HashSet};

use troupe_core::claim::ClaimId;

#[derive(Debug, Default, Clone)]
pub struct TextIndex {
    tokens: HashMap<String, HashSet<ClaimId>>,
}

impl TextIndex {
    pub fn insert(&mut self, claim_id: ClaimId, statement: &str) {
        for token in tokenize(statement) {
            self.tokens.entry(token).or_default().insert(claim_id);
        }
    }

    /// Claims matching every token of `query`. Empty query matches nothing.
    pub fn search(&self, query: &str) -> HashSet<ClaimId> {
        let mut terms = tokenize(query);
        let first = match terms.next() {
            Some(t) => t,
            None => return HashSet::new(),
        };
        let mut result = match self.tokens.get(&first) {
            Some(ids) => ids.clone(),
            None => return HashSet::new(),
        };
        for term in terms {
            match self.tokens.get(&term) {
                Some(ids) => result.retain(|id| ids.contains(id)),
                None => return HashSet::new(),
            }
            if result.is_empty() {
                break;
            }
        }
        result
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
