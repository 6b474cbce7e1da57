// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence ledger inspection.

use std::path::Path;

use clap::Subcommand;

use troupe_core::{Clock, CorrelationId, SystemClock};
use troupe_storage::{EvidenceLedger, LedgerQuery};

use super::Paths;
use crate::exit_error::ExitError;
use crate::output;

#[derive(Subcommand)]
pub enum LedgerCommand {
    /// Show the most recent events.
    Tail {
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },
    /// Show the full timeline of one correlation.
    Show { correlation: String },
}

pub async fn run(workspace: &Path, command: LedgerCommand) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let ledger =
        EvidenceLedger::open(&paths.runtime).map_err(|e| ExitError::failure(e.to_string()))?;
    let reader = ledger.reader();
    let now = SystemClock.epoch_ms();

    match command {
        LedgerCommand::Tail { limit } => {
            let mut events = reader.query(&LedgerQuery::default());
            let skip = events.len().saturating_sub(limit);
            let rows: Vec<Vec<String>> = events
                .drain(..)
                .skip(skip)
                .map(|e| {
                    vec![
                        output::age(now, e.timestamp_ms),
                        e.kind.to_string(),
                        e.source.to_string(),
                        e.pane_id.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                        e.correlation_id.short(8).to_string(),
                    ]
                })
                .collect();
            output::table(&["AGE", "KIND", "SOURCE", "PANE", "CORRELATION"], &rows);
            Ok(())
        }

        LedgerCommand::Show { correlation } => {
            let correlation = CorrelationId::from_string(&correlation);
            let timeline = reader.timeline(&correlation);
            if timeline.is_empty() {
                return Err(ExitError::invalid_input("no events for that correlation"));
            }
            for event in timeline {
                let cause = event
                    .causation_id
                    .map(|c| format!(" <- {c}"))
                    .unwrap_or_default();
                println!(
                    "{}  {}  seq={} {}{}",
                    event.timestamp_ms, event.kind, event.sequence, event.event_id, cause
                );
                if !event.payload.is_null() {
                    println!("    {}", event.payload);
                }
            }
            Ok(())
        }
    }
}
