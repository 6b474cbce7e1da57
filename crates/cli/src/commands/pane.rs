// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane inspection and control.

use std::path::Path;

use clap::Subcommand;

use troupe_core::PaneId;
use troupe_daemon::protocol::{Request, Response};

use super::Paths;
use crate::exit_error::ExitError;
use crate::output;

#[derive(Subcommand)]
pub enum PaneCommand {
    /// List live panes.
    Ls,
    /// Kill a pane by id.
    Kill {
        pane: u32,
        #[arg(long)]
        reason: Option<String>,
    },
}

pub async fn run(workspace: &Path, command: PaneCommand) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let client = super::daemon::connect(&paths).await?;
    match command {
        PaneCommand::Ls => match client.request(Request::Status).await {
            Ok(Response::Status { panes }) => {
                let rows: Vec<Vec<String>> = panes
                    .iter()
                    .map(|p| {
                        vec![
                            p.pane_id.to_string(),
                            p.role.to_string(),
                            format!("{:?}", p.state).to_lowercase(),
                            format!("{:?}", p.health).to_lowercase(),
                        ]
                    })
                    .collect();
                output::table(&["PANE", "ROLE", "STATE", "HEALTH"], &rows);
                Ok(())
            }
            Ok(other) => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
            Err(e) => Err(ExitError::failure(e.to_string())),
        },
        PaneCommand::Kill { pane, reason } => {
            match client.request(Request::Kill { pane_id: PaneId(pane), signal: None, reason }).await
            {
                Ok(Response::Killed { pane_id }) => {
                    println!("pane {pane_id} killed");
                    Ok(())
                }
                Ok(Response::Error { kind, message }) => {
                    Err(ExitError::failure(format!("{kind}: {message}")))
                }
                Ok(other) => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
                Err(e) => Err(ExitError::failure(e.to_string())),
            }
        }
    }
}
