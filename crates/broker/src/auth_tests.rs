// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn first_load_generates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comms-secret");

    let first = load_or_create_secret(&path).unwrap();
    assert_eq!(first.len(), 48);
    let second = load_or_create_secret(&path).unwrap();
    assert_eq!(first, second);
}

#[cfg(unix)]
#[test]
fn secret_file_is_user_private() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comms-secret");
    load_or_create_secret(&path).unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn verify_rejects_mismatch_and_empty() {
    assert!(verify("abc", "abc"));
    assert!(!verify("abc", "abd"));
    assert!(!verify("", ""));
    assert!(!verify("abc", ""));
}

#[test]
fn trailing_newline_is_trimmed_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comms-secret");
    std::fs::write(&path, "secret-value\n").unwrap();
    assert_eq!(load_or_create_secret(&path).unwrap(), "secret-value");
}
