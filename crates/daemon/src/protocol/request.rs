// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request frames accepted by the daemon.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use troupe_core::{PaneGeometry, PaneId, Role};

/// How a write is applied to the pane's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Normal typed input; ghost-dedup applies.
    #[default]
    Interactive,
    /// Bytes passed through untouched (control sequences).
    Raw,
    /// Flow-controlled chunks with an acknowledged byte count.
    Chunked,
}

/// Event channels a client may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeChannel {
    Data,
    Lifecycle,
    Health,
}

/// A request to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Ping,

    Spawn {
        pane_id: PaneId,
        role: Role,
        command: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        geometry: PaneGeometry,
        #[serde(default)]
        scrollback_bytes: Option<usize>,
        #[serde(default)]
        restart_on_dead: bool,
    },

    Write {
        pane_id: PaneId,
        data: String,
        #[serde(default)]
        mode: WriteMode,
        /// Chunked mode: flow-control window in bytes.
        #[serde(default)]
        window: Option<usize>,
    },

    Resize {
        pane_id: PaneId,
        cols: u16,
        rows: u16,
    },

    Kill {
        pane_id: PaneId,
        #[serde(default)]
        signal: Option<i32>,
        #[serde(default)]
        reason: Option<String>,
    },

    /// Dispatch a synthetic submit (carriage return) on behalf of a caller
    /// and watch for effect inside a short verification window.
    SendTrustedEnter {
        pane_id: PaneId,
    },

    Subscribe {
        channels: Vec<SubscribeChannel>,
        /// Raw output bytes are only streamed when explicitly requested.
        #[serde(default)]
        raw: bool,
    },

    Status,

    Shutdown,
}

/// Request envelope: `id` is echoed on the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    #[serde(flatten)]
    pub request: Request,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
