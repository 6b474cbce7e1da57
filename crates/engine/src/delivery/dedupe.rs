// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded LRU of recent message fingerprints, per sender session.

use indexmap::IndexMap;

/// Default capacity of remembered fingerprints.
const DEFAULT_CAPACITY: usize = 512;

/// LRU of `(fingerprint → seen_at_ms)` entries inside a dedup window.
pub struct FingerprintLru {
    entries: IndexMap<[u8; 32], u64>,
    capacity: usize,
    window_ms: u64,
}

impl FingerprintLru {
    pub fn new(window_ms: u64) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, window_ms)
    }

    pub fn with_capacity(capacity: usize, window_ms: u64) -> Self {
        Self { entries: IndexMap::new(), capacity, window_ms }
    }

    /// Record a fingerprint; returns true when it is a duplicate seen
    /// within the window.
    pub fn check_and_insert(&mut self, fingerprint: [u8; 32], now_ms: u64) -> bool {
        let duplicate = match self.entries.get(&fingerprint) {
            Some(seen_at) => now_ms.saturating_sub(*seen_at) <= self.window_ms,
            None => false,
        };
        // Refresh recency either way.
        self.entries.shift_remove(&fingerprint);
        self.entries.insert(fingerprint, now_ms);
        while self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
        duplicate
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "dedupe_tests.rs"]
mod tests;
