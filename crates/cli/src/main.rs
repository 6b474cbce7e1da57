// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `troupe`: the operator CLI and messaging utility.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "troupe", about = "Coordinate a fleet of interactive CLI agents", version)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon lifecycle.
    Daemon {
        #[command(subcommand)]
        command: commands::daemon::DaemonCommand,
    },
    /// Spawn the default fleet panes from config.
    Up,
    /// Send a message to a role (exit 0 on delivered/fallback, 1 on drop, 2 on bad input).
    Send {
        /// Target role or group alias (coordinator, builder, oracle, all, workers).
        target: String,
        /// Message body.
        body: String,
        /// Sender role.
        #[arg(long, default_value = "coordinator")]
        from: String,
        /// Per-sender sequence number.
        #[arg(long, default_value_t = 1)]
        seq: u64,
        /// Priority tag (ack-required, fyi, urgent, task).
        #[arg(long, default_value = "task")]
        priority: String,
    },
    /// Pane inspection.
    Pane {
        #[command(subcommand)]
        command: commands::pane::PaneCommand,
    },
    /// Team-memory claims.
    Claim {
        #[command(subcommand)]
        command: commands::claim::ClaimCommand,
    },
    /// Experiment runs.
    Experiment {
        #[command(subcommand)]
        command: commands::experiment::ExperimentCommand,
    },
    /// Background worker slots (coordinator surface).
    Bg {
        #[command(subcommand)]
        command: commands::background::BgCommand,
    },
    /// Evidence ledger inspection.
    Ledger {
        #[command(subcommand)]
        command: commands::ledger::LedgerCommand,
    },
    /// Regenerate handoffs/session.md from the evidence ledger.
    Handoff,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = cli
        .workspace
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("troupe: failed to start runtime: {e}");
            std::process::exit(2);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Command::Daemon { command } => commands::daemon::run(&workspace, command).await,
            Command::Up => commands::daemon::up(&workspace).await,
            Command::Send { target, body, from, seq, priority } => {
                commands::send::run(&workspace, &target, &body, &from, seq, &priority).await
            }
            Command::Pane { command } => commands::pane::run(&workspace, command).await,
            Command::Claim { command } => commands::claim::run(&workspace, command).await,
            Command::Experiment { command } => commands::experiment::run(&workspace, command).await,
            Command::Bg { command } => commands::background::run(&workspace, command).await,
            Command::Ledger { command } => commands::ledger::run(&workspace, command).await,
            Command::Handoff => commands::handoff::run(&workspace).await,
        }
    });

    match result {
        Ok(()) => {}
        Err(e) => e.exit(),
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
