// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable spool: holds writes submitted while a writer worker is down.
//!
//! Each push is appended and fsynced immediately — spooled writes are the
//! ones the caller could not get committed, so they must survive a crash.
//! On recovery the worker drains in order and truncates.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("spool I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spool encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only side file of pending records.
pub struct Spool<T> {
    path: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Spool<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), _marker: std::marker::PhantomData }
    }

    /// Append one record, durably.
    pub fn push(&self, record: &T) -> Result<(), SpoolError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    /// Read all spooled records in push order. Corrupt tail lines are
    /// dropped (they were mid-write during a crash).
    pub fn drain_pending(&self) -> Result<Vec<T>, SpoolError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.split(b'\n') {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice(&line) {
                Ok(record) => records.push(record),
                Err(_) => break,
            }
        }
        Ok(records)
    }

    /// Remove the spool after a successful drain.
    pub fn truncate(&self) -> Result<(), SpoolError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "spool_tests.rs"]
mod tests;
