// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane model: a logical agent slot pairing a role with an interactive process.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Base id for synthetic background panes (never user-visible).
pub const BACKGROUND_PANE_BASE: u32 = 100;

/// Stable small-integer pane identifier.
///
/// Panes 0..2 are the default fleet; background panes are synthetic ids
/// ≥ [`BACKGROUND_PANE_BASE`], allocated as `100 + parent * 10 + slot`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PaneId(pub u32);

impl PaneId {
    pub fn background(parent: PaneId, slot: u8) -> Self {
        PaneId(BACKGROUND_PANE_BASE + parent.0 * 10 + u32::from(slot))
    }

    /// True for synthetic background-worker panes.
    pub fn is_background(&self) -> bool {
        self.0 >= BACKGROUND_PANE_BASE
    }
}

impl std::fmt::Display for PaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pane lifecycle state, owned by the daemon while alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneState {
    Starting,
    Alive,
    Stuck,
    Dead,
}

impl PaneState {
    pub fn is_alive(&self) -> bool {
        matches!(self, PaneState::Starting | PaneState::Alive | PaneState::Stuck)
    }
}

/// Health status derived from idle clocks and failed-write streaks.
///
/// The monitor walks panes through the cascade dead → stuck → stale → healthy
/// as evidence of activity accumulates, and back down as it ages out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneHealth {
    Healthy,
    Stale,
    Stuck,
    Dead,
}

/// Terminal geometry for spawn and resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneGeometry {
    pub cols: u16,
    pub rows: u16,
}

impl Default for PaneGeometry {
    fn default() -> Self {
        Self { cols: 120, rows: 40 }
    }
}

/// Everything needed to spawn a pane's child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneSpec {
    pub pane_id: PaneId,
    pub role: Role,
    /// Command line, argv form. First element is the program.
    pub command: Vec<String>,
    /// Environment overrides layered on the daemon's environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub geometry: PaneGeometry,
    /// Bytes of scrollback retained for late subscribers.
    #[serde(default = "default_scrollback")]
    pub scrollback_bytes: usize,
}

fn default_scrollback() -> usize {
    256 * 1024
}

/// Restart policy supplied by the caller at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    #[default]
    Never,
    OnDead,
}

#[cfg(test)]
#[path = "pane_tests.rs"]
mod tests;
