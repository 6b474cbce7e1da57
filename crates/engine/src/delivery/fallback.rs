// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger-file fallback: the shared inbox-file protocol.
//!
//! One file per target role under `triggers/`. Producers append with
//! write-temp-then-rename so the watcher never observes a partial write.
//! Every line must carry the `(ROLE #N): ` prefix; the watcher clears a
//! file after a successful injection attempt.

use std::path::{Path, PathBuf};

use thiserror::Error;

use troupe_core::envelope::parse_printed_prefix;
use troupe_core::{MessageEnvelope, Role};

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("trigger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trigger path must be absolute: {0}")]
    RelativePath(PathBuf),

    #[error("line missing the (ROLE #N) prefix: {0:?}")]
    MissingPrefix(String),
}

/// Path of the trigger inbox for a role (or group alias name).
pub fn trigger_path(triggers_dir: &Path, target: &str) -> PathBuf {
    triggers_dir.join(format!("{target}.txt"))
}

/// Append an envelope to the target's trigger file, atomically.
///
/// The whole-file content is rewritten via temp + rename: concurrent
/// watcher reads see either the old or the new complete file.
pub fn write_trigger(
    triggers_dir: &Path,
    role: Role,
    envelope: &MessageEnvelope,
) -> Result<PathBuf, FallbackError> {
    if !triggers_dir.is_absolute() {
        return Err(FallbackError::RelativePath(triggers_dir.to_path_buf()));
    }
    std::fs::create_dir_all(triggers_dir)?;
    let path = trigger_path(triggers_dir, &role.to_string());

    let line = envelope.printed_line();
    if parse_printed_prefix(&line).is_none() {
        return Err(FallbackError::MissingPrefix(line));
    }

    let mut content = match std::fs::read_to_string(&path) {
        Ok(existing) => existing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&line);
    content.push('\n');

    let tmp = path.with_extension("txt.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Read and validate the lines of a trigger file.
pub fn read_trigger(path: &Path) -> Result<Vec<String>, FallbackError> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if parse_printed_prefix(line).is_none() {
            return Err(FallbackError::MissingPrefix(line.to_string()));
        }
        lines.push(line.to_string());
    }
    Ok(lines)
}

/// Clear a trigger file after a successful injection attempt.
pub fn clear_trigger(path: &Path) -> Result<(), FallbackError> {
    let tmp = path.with_extension("txt.tmp");
    std::fs::write(&tmp, "")?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
