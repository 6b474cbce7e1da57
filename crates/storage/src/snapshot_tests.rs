// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct State {
    counter: u64,
    label: String,
}

#[test]
fn store_and_load_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snapshot.json.zst");

    let state = State { counter: 42, label: "hello".to_string() };
    Snapshot::new(10, state.clone()).store(&path).unwrap();

    let loaded: Snapshot<State> = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.covered_seq, 10);
    assert_eq!(loaded.state, state);
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
}

#[test]
fn load_missing_returns_none() {
    let dir = tempdir().unwrap();
    let loaded: Option<Snapshot<State>> =
        Snapshot::load(&dir.path().join("absent.zst")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn store_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snapshot.json.zst");
    Snapshot::new(1, State { counter: 1, label: String::new() }).store(&path).unwrap();
    assert!(!path.with_extension("zst.tmp").exists());
}

#[test]
fn version_mismatch_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snapshot.json.zst");

    let mut snapshot = Snapshot::new(1, State { counter: 1, label: String::new() });
    snapshot.version = 99;
    // Bypass the constructor's version to simulate a future format.
    let json = serde_json::to_vec(&snapshot).unwrap();
    let compressed = zstd::encode_all(json.as_slice(), 3).unwrap();
    std::fs::write(&path, compressed).unwrap();

    let result: Result<Option<Snapshot<State>>, _> = Snapshot::load(&path);
    assert!(matches!(result, Err(SnapshotError::Version { found: 99 })));
}
