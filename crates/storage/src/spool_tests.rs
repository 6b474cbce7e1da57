// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item(u32);

#[test]
fn push_then_drain_preserves_order() {
    let dir = tempdir().unwrap();
    let spool = Spool::new(&dir.path().join("spool.log"));

    spool.push(&Item(1)).unwrap();
    spool.push(&Item(2)).unwrap();
    spool.push(&Item(3)).unwrap();

    assert_eq!(spool.drain_pending().unwrap(), vec![Item(1), Item(2), Item(3)]);
}

#[test]
fn drain_of_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let spool: Spool<Item> = Spool::new(&dir.path().join("absent.log"));
    assert!(spool.drain_pending().unwrap().is_empty());
    assert!(spool.is_empty());
}

#[test]
fn truncate_clears_pending() {
    let dir = tempdir().unwrap();
    let spool = Spool::new(&dir.path().join("spool.log"));
    spool.push(&Item(1)).unwrap();
    assert!(!spool.is_empty());

    spool.truncate().unwrap();
    assert!(spool.is_empty());
    assert!(spool.drain_pending().unwrap().is_empty());
}

#[test]
fn corrupt_tail_is_dropped_not_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("spool.log");
    let spool = Spool::new(&path);
    spool.push(&Item(1)).unwrap();
    spool.push(&Item(2)).unwrap();
    {
        // Simulate a crash mid-write.
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"truncated").unwrap();
    }
    assert_eq!(spool.drain_pending().unwrap(), vec![Item(1), Item(2)]);
}

#[test]
fn drain_is_repeatable_until_truncate() {
    let dir = tempdir().unwrap();
    let spool = Spool::new(&dir.path().join("spool.log"));
    spool.push(&Item(7)).unwrap();
    assert_eq!(spool.drain_pending().unwrap(), vec![Item(7)]);
    assert_eq!(spool.drain_pending().unwrap(), vec![Item(7)]);
    spool.truncate().unwrap();
    assert!(spool.drain_pending().unwrap().is_empty());
}
