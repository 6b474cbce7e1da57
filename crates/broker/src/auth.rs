// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared-secret authentication for broker clients.
//!
//! The secret lives in a user-private file; CLI wrappers read it from
//! `TROUPE_COMMS_SECRET` or the file directly. The secret is never logged.

use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

const SECRET_LEN: usize = 48;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load the comms secret, generating one on first use (mode 0600).
pub fn load_or_create_secret(path: &Path) -> Result<String, SecretError> {
    if path.exists() {
        return Ok(std::fs::read_to_string(path)?.trim().to_string());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect();
    std::fs::write(path, &secret)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(secret)
}

/// Constant-time-ish comparison is unnecessary for a loopback-only bus,
/// but reject empty secrets outright.
pub fn verify(expected: &str, provided: &str) -> bool {
    !expected.is_empty() && expected == provided
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
