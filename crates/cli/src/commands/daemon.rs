// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle and the foreground app instance (`troupe up`).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use troupe_core::{PaneGeometry, PaneId, Role, SystemClock};
use troupe_daemon::protocol::{Request, Response};
use troupe_daemon::DaemonClient;

use super::Paths;
use crate::exit_error::ExitError;
use crate::output;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the PTY daemon.
    Start {
        /// Stay in the foreground instead of detaching.
        #[arg(long)]
        foreground: bool,
    },
    /// Ask a running daemon to shut down.
    Stop,
    /// Show daemon and pane status.
    Status,
}

pub async fn run(workspace: &Path, command: DaemonCommand) -> Result<(), ExitError> {
    match command {
        DaemonCommand::Start { foreground } => start(workspace, foreground).await,
        DaemonCommand::Stop => stop(workspace).await,
        DaemonCommand::Status => status(workspace).await,
    }
}

async fn start(workspace: &Path, foreground: bool) -> Result<(), ExitError> {
    if foreground {
        return troupe_daemon::lifecycle::run(workspace)
            .await
            .map_err(|e| ExitError::failure(e.to_string()));
    }
    // Detach: re-invoke ourselves in foreground mode.
    let exe = std::env::current_exe().map_err(|e| ExitError::failure(e.to_string()))?;
    std::process::Command::new(exe)
        .arg("--workspace")
        .arg(workspace)
        .args(["daemon", "start", "--foreground"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ExitError::failure(format!("daemon spawn failed: {e}")))?;
    println!("daemon starting");
    Ok(())
}

async fn stop(workspace: &Path) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let client = connect(&paths).await?;
    match client.request(Request::Shutdown).await {
        Ok(Response::ShuttingDown) => {
            println!("daemon shutting down");
            Ok(())
        }
        Ok(other) => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
        Err(e) => Err(ExitError::failure(e.to_string())),
    }
}

async fn status(workspace: &Path) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let client = match connect(&paths).await {
        Ok(client) => client,
        Err(_) => {
            println!("daemon: not running");
            return Ok(());
        }
    };
    match client.request(Request::Status).await {
        Ok(Response::Status { panes }) => {
            println!("daemon: running");
            let rows: Vec<Vec<String>> = panes
                .iter()
                .map(|p| {
                    vec![
                        p.pane_id.to_string(),
                        p.role.to_string(),
                        format!("{:?}", p.state).to_lowercase(),
                        format!("{:?}", p.health).to_lowercase(),
                        p.pid.map(|pid| pid.to_string()).unwrap_or_else(|| "-".into()),
                        p.bytes_read.to_string(),
                    ]
                })
                .collect();
            output::table(&["PANE", "ROLE", "STATE", "HEALTH", "PID", "READ"], &rows);
            Ok(())
        }
        Ok(other) => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
        Err(e) => Err(ExitError::failure(e.to_string())),
    }
}

pub async fn connect(paths: &Paths) -> Result<DaemonClient, ExitError> {
    DaemonClient::connect(&paths.socket)
        .await
        .map_err(|e| ExitError::failure(e.to_string()))
}

/// Spawn the fleet and run the app instance (broker, watcher, engine) in
/// the foreground until interrupted.
pub async fn up(workspace: &Path) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let config = super::load_config(&paths)?;
    let secret = troupe_broker::load_or_create_secret(&paths.secret)
        .map_err(|e| ExitError::failure(e.to_string()))?;
    let client = connect(&paths).await?;

    // Spawn the fixed fleet from config.
    for role in [Role::Coordinator, Role::Builder, Role::Oracle] {
        let role_config = config.roles.get(&role.to_string());
        let command = role_config
            .map(|r| r.command.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| vec!["sh".to_string()]);
        let mut env: HashMap<String, String> =
            role_config.map(|r| r.env.clone()).unwrap_or_default();
        env.insert(troupe_core::env::COMMS_SECRET.to_string(), secret.clone());

        let pane_id = role.default_pane().unwrap_or(PaneId(0));
        let response = client
            .request(Request::Spawn {
                pane_id,
                role,
                command,
                env,
                geometry: PaneGeometry::default(),
                scrollback_bytes: None,
                restart_on_dead: true,
            })
            .await
            .map_err(|e| ExitError::failure(e.to_string()))?;
        match response {
            Response::Spawned { pid, .. } => println!("{role}: pane {pane_id} pid {pid}"),
            Response::Error { kind, message } if kind == "already_spawned" => {
                println!("{role}: {message}");
            }
            Response::Error { kind, message } => {
                return Err(ExitError::failure(format!("{role}: {kind}: {message}")));
            }
            other => return Err(ExitError::failure(format!("unexpected response: {other:?}"))),
        }
    }

    // The app instance: stores, engine, broker, trigger watcher.
    let host = Arc::new(
        troupe_engine::SocketPaneHost::connect(&paths.socket)
            .await
            .map_err(|e| ExitError::failure(e.to_string()))?,
    );
    let ledger = troupe_storage::EvidenceLedger::open(&paths.runtime)
        .map_err(|e| ExitError::failure(e.to_string()))?;
    let (ledger_handle, _reader, _ledger_task) =
        troupe_storage::spawn_writer(ledger, &paths.runtime.join("evidence-spool.log"));

    let clock = SystemClock;
    let delivery = troupe_engine::DeliveryEngine::new(
        Arc::clone(&host),
        ledger_handle.clone(),
        Arc::new(config.clone()),
        clock.clone(),
        paths.triggers.clone(),
    );
    let _observer = delivery.spawn_observer();

    let coordinator_pane = Role::Coordinator.default_pane().unwrap_or(PaneId(0));
    let worker_command = config
        .roles
        .get("coordinator")
        .map(|r| r.command.clone())
        .unwrap_or_else(|| vec!["sh".to_string()]);
    let background = troupe_engine::BackgroundManager::new(
        Arc::clone(&host),
        ledger_handle.clone(),
        clock.clone(),
        coordinator_pane,
        Role::Coordinator,
        worker_command,
    );
    let cancel = CancellationToken::new();
    let _reaper = background.spawn_reaper(cancel.clone());
    let _watcher = troupe_broker::spawn_trigger_watcher(
        Arc::clone(&host),
        ledger_handle,
        clock.clone(),
        paths.triggers.clone(),
        cancel.clone(),
    );

    let broker = troupe_broker::Broker::new(delivery, background, host, secret, clock);
    let port = super::broker_port(&paths);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|e| ExitError::failure(format!("broker bind: {e}")))?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
    std::fs::write(&paths.link, serde_json::json!({"broker_port": port}).to_string())
        .map_err(|e| ExitError::failure(e.to_string()))?;
    println!("broker: ws://127.0.0.1:{port}");

    // Session metadata alongside the stores.
    for dir in ["state", "context-snapshots", "handoffs"] {
        let _ = std::fs::create_dir_all(paths.troupe.join(dir));
    }
    let status = serde_json::json!({
        "pid": std::process::id(),
        "started_at_ms": troupe_core::Clock::epoch_ms(&SystemClock),
        "broker_port": port,
    });
    std::fs::write(paths.troupe.join("app-status.json"), status.to_string())
        .map_err(|e| ExitError::failure(e.to_string()))?;

    let serve = tokio::spawn(broker.serve(listener, cancel.clone()));
    let _ = tokio::signal::ctrl_c().await;
    cancel.cancel();
    let _ = serve.await;
    let _ = std::fs::remove_file(paths.troupe.join("app-status.json"));
    Ok(())
}
