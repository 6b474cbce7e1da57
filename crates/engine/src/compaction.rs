// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pane compaction detector.
//!
//! Some wrapped CLIs periodically compact their own context, producing a
//! burst of output that looks like activity but must not count as
//! injection evidence. The detector runs the state machine
//! none → suspected → confirmed → cooldown over four signals: a lexical
//! marker, a repeated-structure burst, sustained output without a restored
//! prompt, and the absence of a recent user-injection root event.
//! Only `confirmed` defers non-critical injects; `suspected` merely
//! degrades verification confidence. Recovery intents bypass every state.

use serde::{Deserialize, Serialize};

/// Lexical markers that strongly suggest compaction output.
const LEXICAL_MARKERS: &[&str] = &["Compacting conversation", "compacting context", "Summarizing"];

/// Sustained evidence required before promoting to suspected.
const SUSPECT_AFTER_MS: u64 = 300;
/// Sustained evidence required before promoting to confirmed.
const CONFIRM_AFTER_MS: u64 = 800;
/// Quiet time after the last evidence before returning to none.
const COOLDOWN_MS: u64 = 1_500;
/// Output bursts within this window with near-identical lengths count as
/// repeated structure.
const BURST_WINDOW_MS: u64 = 200;
/// A user injection within this window suppresses promotion.
const RECENT_INJECT_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionState {
    None,
    Suspected,
    Confirmed,
    Cooldown,
}

/// One pane's detector.
#[derive(Debug, Clone)]
pub struct CompactionDetector {
    state: CompactionState,
    /// When the current evidence run began.
    evidence_since_ms: Option<u64>,
    last_evidence_ms: u64,
    last_inject_ms: u64,
    /// (length, at_ms) of the previous chunk, for burst detection.
    last_chunk: Option<(usize, u64)>,
}

impl Default for CompactionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CompactionDetector {
    pub fn new() -> Self {
        Self {
            state: CompactionState::None,
            evidence_since_ms: None,
            last_evidence_ms: 0,
            last_inject_ms: 0,
            last_chunk: None,
        }
    }

    pub fn state(&self) -> CompactionState {
        self.state
    }

    /// Record a user-injection root event: recent injections explain
    /// output bursts, suppressing promotion.
    pub fn note_injection(&mut self, now_ms: u64) {
        self.last_inject_ms = now_ms;
    }

    /// Feed one output observation. Returns the state after the update.
    pub fn observe_output(&mut self, text: Option<&str>, byte_len: usize, now_ms: u64) -> CompactionState {
        let lexical = text
            .map(|t| LEXICAL_MARKERS.iter().any(|m| t.contains(m)))
            .unwrap_or(false);

        let burst = match self.last_chunk {
            Some((len, at)) => {
                now_ms.saturating_sub(at) <= BURST_WINDOW_MS
                    && len.abs_diff(byte_len) <= len.max(byte_len) / 8
            }
            None => false,
        };
        self.last_chunk = Some((byte_len, now_ms));

        let recently_injected = now_ms.saturating_sub(self.last_inject_ms) <= RECENT_INJECT_MS;
        let evidence = lexical || (burst && !recently_injected);

        if evidence {
            self.last_evidence_ms = now_ms;
            let since = *self.evidence_since_ms.get_or_insert(now_ms);
            let sustained = now_ms.saturating_sub(since);
            self.state = if lexical && sustained >= CONFIRM_AFTER_MS {
                CompactionState::Confirmed
            } else if sustained >= CONFIRM_AFTER_MS && !recently_injected {
                CompactionState::Confirmed
            } else if sustained >= SUSPECT_AFTER_MS || lexical {
                // A lexical marker is strong enough to suspect immediately.
                if self.state == CompactionState::Confirmed {
                    CompactionState::Confirmed
                } else {
                    CompactionState::Suspected
                }
            } else {
                self.state
            };
        } else {
            self.tick(now_ms);
        }
        self.state
    }

    /// Advance timers with no new evidence.
    pub fn tick(&mut self, now_ms: u64) -> CompactionState {
        let quiet = now_ms.saturating_sub(self.last_evidence_ms);
        match self.state {
            CompactionState::Confirmed | CompactionState::Suspected if quiet >= COOLDOWN_MS => {
                self.state = CompactionState::Cooldown;
                self.evidence_since_ms = None;
            }
            CompactionState::Cooldown if quiet >= COOLDOWN_MS * 2 => {
                self.state = CompactionState::None;
            }
            _ => {}
        }
        self.state
    }

    /// The CLI announced compaction ended (hook or prompt restore).
    pub fn end(&mut self, now_ms: u64) {
        self.state = CompactionState::Cooldown;
        self.evidence_since_ms = None;
        self.last_evidence_ms = now_ms.saturating_sub(COOLDOWN_MS);
    }

    /// Should a non-recovery inject defer right now?
    pub fn defers_inject(&self) -> bool {
        self.state == CompactionState::Confirmed
    }

    /// Should verification confidence degrade?
    pub fn degrades_verification(&self) -> bool {
        matches!(self.state, CompactionState::Suspected | CompactionState::Confirmed)
    }
}

#[cfg(test)]
#[path = "compaction_tests.rs"]
mod tests;
