// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint snapshots: zstd-compressed JSON of a store's materialized
//! state plus the WAL seq it covers. After a snapshot lands, the WAL is
//! truncated to the uncovered tail.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("snapshot version {found} unsupported (current {CURRENT_SNAPSHOT_VERSION})")]
    Version { found: u32 },
}

/// Versioned snapshot envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub version: u32,
    /// Highest WAL seq folded into `state`.
    pub covered_seq: u64,
    pub state: S,
}

impl<S> Snapshot<S>
where
    S: Serialize + DeserializeOwned,
{
    pub fn new(covered_seq: u64, state: S) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, covered_seq, state }
    }

    /// Write atomically: compress to a temp file, then rename.
    pub fn store(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;
        let tmp = path.with_extension("zst.tmp");
        std::fs::write(&tmp, compressed)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot if one exists. A version mismatch is an error so
    /// the caller can fall back to full WAL replay.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let compressed = std::fs::read(path)?;
        let json = zstd::decode_all(compressed.as_slice())?;
        let snapshot: Snapshot<S> = serde_json::from_slice(&json)?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::Version { found: snapshot.version });
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
