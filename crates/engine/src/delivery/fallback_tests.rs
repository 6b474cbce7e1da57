// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use troupe_core::test_support;

#[test]
fn write_creates_inbox_with_prefixed_line() {
    let dir = tempfile::tempdir().unwrap();
    let envelope = test_support::envelope("build module X", 1);

    let path = write_trigger(dir.path(), Role::Builder, &envelope).unwrap();
    assert_eq!(path, dir.path().join("builder.txt"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "(COORD #1): build module X\n");
}

#[test]
fn writes_append_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_trigger(dir.path(), Role::Oracle, &test_support::envelope("one", 1)).unwrap();
    write_trigger(dir.path(), Role::Oracle, &test_support::envelope("two", 2)).unwrap();

    let lines = read_trigger(&trigger_path(dir.path(), "oracle")).unwrap();
    assert_eq!(lines, vec!["(COORD #1): one", "(COORD #2): two"]);
}

#[test]
fn relative_dir_is_rejected() {
    let envelope = test_support::envelope("x", 1);
    let err = write_trigger(Path::new("relative/triggers"), Role::Builder, &envelope).unwrap_err();
    assert!(matches!(err, FallbackError::RelativePath(_)));
}

#[test]
fn no_temp_file_remains_after_write() {
    let dir = tempfile::tempdir().unwrap();
    let path =
        write_trigger(dir.path(), Role::Builder, &test_support::envelope("x", 1)).unwrap();
    assert!(!path.with_extension("txt.tmp").exists());
}

#[test]
fn read_rejects_unprefixed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = trigger_path(dir.path(), "builder");
    std::fs::write(&path, "no prefix here\n").unwrap();
    let err = read_trigger(&path).unwrap_err();
    assert!(matches!(err, FallbackError::MissingPrefix(_)));
}

#[test]
fn clear_empties_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path =
        write_trigger(dir.path(), Role::Builder, &test_support::envelope("x", 1)).unwrap();
    clear_trigger(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    assert!(read_trigger(&path).unwrap().is_empty());
}
