// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `trouped`: the troupe PTY daemon binary.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use troupe_daemon::{env, lifecycle};

fn workspace_from_args() -> PathBuf {
    // `trouped [workspace-root]`, defaulting to the current directory.
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() {
    let workspace = workspace_from_args();

    let log_path = env::log_path(&workspace);
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file_appender = tracing_appender::rolling::never(
        log_path.parent().unwrap_or(&workspace),
        "daemon.log",
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    if let Err(e) = lifecycle::run(&workspace).await {
        eprintln!("trouped: {e}");
        std::process::exit(1);
    }
}
