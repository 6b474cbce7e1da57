// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.

pub mod background;
pub mod claim;
pub mod daemon;
pub mod experiment;
pub mod handoff;
pub mod ledger;
pub mod pane;
pub mod send;

use std::path::{Path, PathBuf};

use crate::exit_error::ExitError;

/// Workspace-local paths shared by the commands.
pub struct Paths {
    pub troupe: PathBuf,
    pub runtime: PathBuf,
    pub triggers: PathBuf,
    pub socket: PathBuf,
    pub secret: PathBuf,
    pub config: PathBuf,
    pub handoffs: PathBuf,
    pub link: PathBuf,
}

impl Paths {
    pub fn new(workspace: &Path) -> Self {
        let troupe = workspace.join(".troupe");
        Self {
            runtime: troupe.join("runtime"),
            triggers: troupe.join("triggers"),
            socket: troupe.join("daemon.sock"),
            secret: troupe.join("comms-secret"),
            config: troupe.join("config.toml"),
            handoffs: troupe.join("handoffs"),
            link: troupe.join("link.json"),
            troupe,
        }
    }
}

/// Default loopback port for the broker websocket.
pub const DEFAULT_BROKER_PORT: u16 = 48732;

/// Read the broker port from `link.json`, falling back to the default.
pub fn broker_port(paths: &Paths) -> u16 {
    std::fs::read_to_string(&paths.link)
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .and_then(|link| link.get("broker_port").and_then(|p| p.as_u64()))
        .map(|p| p as u16)
        .unwrap_or(DEFAULT_BROKER_PORT)
}

/// Load the workspace config, defaulting when absent.
pub fn load_config(paths: &Paths) -> Result<troupe_core::TroupeConfig, ExitError> {
    if !paths.config.exists() {
        return Ok(troupe_core::TroupeConfig::default());
    }
    troupe_core::TroupeConfig::load(&paths.config)
        .map_err(|e| ExitError::invalid_input(format!("config: {e}")))
}
