// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelopes: the normalized record a delivery accounts for.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::define_id;
use crate::role::{Role, Target};

define_id! {
    /// Unique message id (`msg-` prefix).
    pub struct MessageId("msg-");
}

define_id! {
    /// Sender session id; sequence numbers reset per session.
    pub struct SessionId("ssn-");
}

/// Delivery priority tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityTag {
    AckRequired,
    #[default]
    Fyi,
    Urgent,
    Task,
}

impl PriorityTag {
    /// Recovery-class intents bypass compaction gating.
    pub fn is_recovery(&self) -> bool {
        matches!(self, PriorityTag::Urgent)
    }
}

/// Immutable message envelope. The body is what gets injected into the
/// target pane, prefixed as `(ROLE #N): `.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_id: MessageId,
    pub from_role: Role,
    pub target: Target,
    pub body: String,
    #[serde(default)]
    pub priority: PriorityTag,
    /// Per-sender sequence, reset on session start.
    pub sequence_number: u64,
    pub sender_session: SessionId,
    pub created_at_ms: u64,
}

impl MessageEnvelope {
    /// Content fingerprint for dedup: hash of body plus the
    /// (from, target, sequence) triple.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.body.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.from_role.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.target.to_string().as_bytes());
        hasher.update(self.sequence_number.to_le_bytes());
        hasher.finalize().into()
    }

    /// The printed prefix the human sees: `(COORD #3): `.
    pub fn printed_prefix(&self) -> String {
        format!("({} #{}): ", self.from_role.prefix_tag(), self.sequence_number)
    }

    /// The full line as injected into a pane.
    pub fn printed_line(&self) -> String {
        format!("{}{}", self.printed_prefix(), self.body)
    }
}

/// Parse a printed prefix `(ROLE #N): rest` into (tag, sequence, rest).
///
/// Returns `None` when the line does not carry the prefix shape; the
/// delivery engine uses this to enforce prefix/envelope agreement and the
/// trigger watcher uses it to validate fallback inbox lines.
pub fn parse_printed_prefix(line: &str) -> Option<(&str, u64, &str)> {
    let rest = line.strip_prefix('(')?;
    let (tag, rest) = rest.split_once(" #")?;
    let (seq, rest) = rest.split_once("): ")?;
    let seq: u64 = seq.parse().ok()?;
    if tag.is_empty() || tag.contains(|c: char| c.is_whitespace()) {
        return None;
    }
    Some((tag, seq, rest))
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
