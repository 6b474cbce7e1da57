// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::CommandFactory;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn send_parses_positional_target_and_body() {
    let cli = Cli::parse_from(["troupe", "send", "builder", "build module X", "--seq", "3"]);
    match cli.command {
        Command::Send { target, body, seq, from, priority } => {
            assert_eq!(target, "builder");
            assert_eq!(body, "build module X");
            assert_eq!(seq, 3);
            assert_eq!(from, "coordinator");
            assert_eq!(priority, "task");
        }
        _ => panic!("expected send"),
    }
}

#[test]
fn workspace_flag_is_global() {
    let cli = Cli::parse_from(["troupe", "--workspace", "/tmp/w", "daemon", "status"]);
    assert_eq!(cli.workspace.as_deref(), Some(std::path::Path::new("/tmp/w")));
}
