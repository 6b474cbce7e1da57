// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon paths and tunables.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Protocol version announced to clients.
pub const PROTOCOL_VERSION: &str = "1";

/// Per-request I/O timeout on the control channel.
pub fn ipc_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Workspace-local hidden directory.
pub fn troupe_dir(workspace: &Path) -> PathBuf {
    workspace.join(".troupe")
}

pub fn socket_path(workspace: &Path) -> PathBuf {
    troupe_dir(workspace).join("daemon.sock")
}

pub fn lock_path(workspace: &Path) -> PathBuf {
    troupe_dir(workspace).join("daemon.lock")
}

pub fn log_path(workspace: &Path) -> PathBuf {
    troupe_dir(workspace).join("daemon.log")
}

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    troupe_dir(workspace).join("runtime")
}

pub fn triggers_dir(workspace: &Path) -> PathBuf {
    troupe_dir(workspace).join("triggers")
}
