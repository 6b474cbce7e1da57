// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log: one JSON record per line, monotonic `seq`.
//!
//! Corruption is handled at open: the valid prefix is preserved, the
//! corrupt file is rotated to `.bak` (keeping at most 3 backups), and a
//! clean log is rewritten. Appends buffer in memory and flush on a
//! count/interval threshold or on demand.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Buffered appends before a flush is forced.
const FLUSH_THRESHOLD: usize = 100;
/// Max age of buffered appends before a flush is forced.
const FLUSH_INTERVAL: Duration = Duration::from_millis(500);
/// Rotated backups kept on corruption (`.bak`, `.bak.2`, `.bak.3`).
const MAX_BACKUPS: u32 = 3;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One persisted record with its sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry<T> {
    pub seq: u64,
    pub record: T,
}

/// Append-only log of `T` records.
pub struct Wal<T> {
    path: PathBuf,
    /// All valid entries, in seq order. The disk file mirrors this after flush.
    entries: Vec<WalEntry<T>>,
    /// Entries not yet flushed to disk (tail of `entries`).
    unflushed: usize,
    write_seq: u64,
    processed_seq: u64,
    last_flush: Instant,
}

impl<T> Wal<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open (or create) a WAL, recovering the valid prefix on corruption.
    ///
    /// `processed_seq` marks entries already applied to a snapshot; they
    /// are skipped by [`Wal::next_unprocessed`].
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        let mut entries = Vec::new();
        let mut corrupt = false;

        if path.exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            for line in reader.split(b'\n') {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                let parsed: Option<WalEntry<T>> = std::str::from_utf8(&line)
                    .ok()
                    .and_then(|text| serde_json::from_str(text).ok());
                match parsed {
                    Some(entry) => entries.push(entry),
                    None => {
                        corrupt = true;
                        break;
                    }
                }
            }
        }

        if corrupt {
            rotate_backups(path)?;
            // Rewrite only the valid prefix.
            write_entries(path, &entries)?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            unflushed: 0,
            write_seq,
            processed_seq,
            last_flush: Instant::now(),
        })
    }

    /// Append a record, returning its sequence number. Buffered until flush.
    pub fn append(&mut self, record: &T) -> Result<u64, WalError> {
        self.write_seq += 1;
        self.entries.push(WalEntry { seq: self.write_seq, record: record.clone() });
        self.unflushed += 1;
        Ok(self.write_seq)
    }

    /// True when the buffered tail should be written out.
    pub fn needs_flush(&self) -> bool {
        self.unflushed > 0
            && (self.unflushed >= FLUSH_THRESHOLD || self.last_flush.elapsed() >= FLUSH_INTERVAL)
    }

    /// Write buffered entries to disk and fsync.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.unflushed == 0 {
            return Ok(());
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let start = self.entries.len() - self.unflushed;
        for entry in &self.entries[start..] {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;
        self.unflushed = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Next entry past the processed cursor, or `None` when caught up.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry<T>>, WalError> {
        let next = self
            .entries
            .iter()
            .find(|e| e.seq > self.processed_seq)
            .cloned();
        Ok(next)
    }

    /// Advance the processed cursor.
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// All entries with `seq > after`.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry<T>>, WalError> {
        Ok(self.entries.iter().filter(|e| e.seq > after).cloned().collect())
    }

    /// Drop entries with `seq < before` and rewrite the log (checkpoint).
    pub fn truncate_before(&mut self, before: u64) -> Result<(), WalError> {
        self.flush()?;
        self.entries.retain(|e| e.seq >= before);
        write_entries(&self.path, &self.entries)?;
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rewrite the log atomically: temp file then rename.
fn write_entries<T: Serialize>(path: &Path, entries: &[WalEntry<T>]) -> Result<(), WalError> {
    let tmp = path.with_extension("wal.tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Rotate `.bak` → `.bak.2` → `.bak.3`, then move the corrupt file to `.bak`.
fn rotate_backups(path: &Path) -> Result<(), WalError> {
    for i in (1..MAX_BACKUPS).rev() {
        let from = backup_path(path, i);
        let to = backup_path(path, i + 1);
        if from.exists() {
            std::fs::rename(&from, &to)?;
        }
    }
    std::fs::rename(path, backup_path(path, 1))?;
    Ok(())
}

fn backup_path(path: &Path, index: u32) -> PathBuf {
    if index == 1 {
        path.with_extension("bak")
    } else {
        path.with_extension(format!("bak.{index}"))
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
