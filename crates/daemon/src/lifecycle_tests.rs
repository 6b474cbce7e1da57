// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn lock_is_exclusive_per_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let first = LockGuard::acquire(dir.path()).unwrap();
    let second = LockGuard::acquire(dir.path());
    assert!(matches!(second, Err(DaemonError::AlreadyRunning(_))));
    drop(first);
    // Released lock can be re-acquired.
    LockGuard::acquire(dir.path()).unwrap();
}

#[test]
fn separate_workspaces_do_not_contend() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let _lock_a = LockGuard::acquire(a.path()).unwrap();
    let _lock_b = LockGuard::acquire(b.path()).unwrap();
}
