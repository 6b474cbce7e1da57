// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response and event frames emitted by the daemon.

use serde::{Deserialize, Serialize};

use troupe_core::{PaneHealth, PaneId, PaneState, Role};

/// Result of a write request. Writes to missing or dead panes never
/// silently succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Accepted,
    RejectedTerminalMissing,
    RejectedNotAlive,
    RejectedModeNoninteractive,
    BlockedGhostDedup,
    Error,
}

impl WriteStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, WriteStatus::Accepted)
    }
}

/// Outcome of a trusted-enter dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterOutcome {
    /// Submit dispatched and the pane produced output in the window.
    SubmittedActive,
    /// Submit dispatched, no observable effect yet.
    SubmittedQuiet,
    Rejected,
}

/// One pane's row in a status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneStatusEntry {
    pub pane_id: PaneId,
    pub role: Role,
    pub state: PaneState,
    pub health: PaneHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// A response to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Spawned {
        pane_id: PaneId,
        pid: u32,
    },
    WriteAck {
        status: WriteStatus,
        /// Bytes accepted into the pane (chunked mode reports progress).
        acked_bytes: usize,
    },
    ResizeAck {
        pane_id: PaneId,
        cols: u16,
        rows: u16,
    },
    Killed {
        pane_id: PaneId,
    },
    EnterResult {
        outcome: EnterOutcome,
    },
    Subscribed,
    Status {
        panes: Vec<PaneStatusEntry>,
    },
    ShuttingDown,
    Error {
        kind: String,
        message: String,
    },
}

impl Response {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Response::Error { kind: kind.to_string(), message: message.into() }
    }
}

/// Response envelope echoing the request `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(flatten)]
    pub response: Response,
}

/// Unsolicited event frames for subscribed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// Output activity metadata. Raw bytes ride along only for subscribers
    /// that asked for them.
    PtyData {
        pane_id: PaneId,
        byte_len: usize,
        /// Whether the chunk looks like meaningful output rather than
        /// echo/control noise.
        meaningful: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytes: Option<String>,
        at_ms: u64,
    },
    PtyUp {
        pane_id: PaneId,
        pid: u32,
    },
    PtyDown {
        pane_id: PaneId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        reason: String,
    },
    PaneHealth {
        pane_id: PaneId,
        status: PaneHealth,
    },
    PtyResizeAck {
        pane_id: PaneId,
        cols: u16,
        rows: u16,
    },
    /// Back-pressure summary: frames dropped for this subscriber since the
    /// last delivery.
    Meta {
        dropped: u64,
    },
}

/// Event envelope as written to subscribed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventFrame(pub DaemonEvent);

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
