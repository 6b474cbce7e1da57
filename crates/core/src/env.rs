// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognized environment variables.

/// Role this process acts as.
pub const ROLE: &str = "TROUPE_ROLE";
/// Pane id this process is attached to.
pub const PANE_ID: &str = "TROUPE_PANE_ID";
/// Parent pane id, set only for background workers.
pub const PARENT_PANE_ID: &str = "TROUPE_PARENT_PANE_ID";
/// Background alias (`<parentRole>-bg-<slot>`), set only for background workers.
pub const BG_ALIAS: &str = "TROUPE_BG_ALIAS";
/// Shared secret for broker authentication. Never logged.
pub const COMMS_SECRET: &str = "TROUPE_COMMS_SECRET";
/// Gate for permissive CLI flags in spawned agent commands.
pub const UNSAFE_AUTONOMY: &str = "TROUPE_UNSAFE_AUTONOMY";

/// True when the unsafe-autonomy gate is explicitly enabled.
pub fn unsafe_autonomy() -> bool {
    std::env::var(UNSAFE_AUTONOMY).map(|v| v == "1" || v == "true").unwrap_or(false)
}
