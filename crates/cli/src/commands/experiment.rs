// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Experiment surface: run named profiles, inspect past runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;

use troupe_core::claim::ClaimId;
use troupe_core::{Clock, EvidenceRelation, SystemClock};
use troupe_storage::{spawn_memory_writer, EvidenceLedger, TeamMemory};

use super::Paths;
use crate::exit_error::ExitError;
use crate::output;

#[derive(Subcommand)]
pub enum ExperimentCommand {
    /// Run a named experiment profile.
    Run {
        profile: String,
        /// Profile parameters as key=value (checked against the allowlist).
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Claim to bind the outcome to.
        #[arg(long)]
        claim: Option<String>,
        #[arg(long, value_name = "supports|contradicts|causedBy", default_value = "supports")]
        relation: String,
        /// Caller-supplied dedup key.
        #[arg(long, default_value = "")]
        key: String,
        /// Repository revision recorded in meta.json.
        #[arg(long, default_value = "")]
        revision: String,
    },
    /// List experiment runs.
    Ls,
}

pub async fn run(workspace: &Path, command: ExperimentCommand) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let config = super::load_config(&paths)?;

    match command {
        ExperimentCommand::Run { profile, args, claim, relation, key, revision } => {
            let mut parsed_args = HashMap::new();
            for pair in &args {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| ExitError::invalid_input(format!("bad --arg {pair:?}")))?;
                parsed_args.insert(name.to_string(), value.to_string());
            }
            let relation: EvidenceRelation =
                serde_json::from_value(serde_json::Value::String(relation.clone()))
                    .map_err(|_| ExitError::invalid_input(format!("unknown relation {relation:?}")))?;
            let claim = claim.map(|id| ClaimId::from_string(&id));

            // Compose the stack: daemon host, ledger, memory, engine.
            let host = Arc::new(
                troupe_engine::SocketPaneHost::connect(&paths.socket)
                    .await
                    .map_err(|e| ExitError::failure(e.to_string()))?,
            );
            let ledger = EvidenceLedger::open(&paths.runtime)
                .map_err(|e| ExitError::failure(e.to_string()))?;
            let (ledger_handle, _reader, _lt) = troupe_storage::spawn_writer(
                ledger,
                &paths.runtime.join("evidence-spool.log"),
            );
            let store = TeamMemory::open(&paths.runtime, HashMap::new())
                .map_err(|e| ExitError::failure(e.to_string()))?;
            let (memory, _mr, _mt) =
                spawn_memory_writer(store, &paths.runtime.join("team-memory-spool.log"));
            let engine = troupe_engine::ExperimentEngine::new(
                host,
                memory.clone(),
                ledger_handle,
                Arc::new(config),
                SystemClock,
                paths.runtime.join("experiments"),
            );

            let outcome = engine
                .run(
                    &profile,
                    parsed_args,
                    claim,
                    Some(relation),
                    troupe_core::Role::Coordinator,
                    &revision,
                    &key,
                )
                .await
                .map_err(|e| ExitError::failure(e.to_string()))?;
            memory.checkpoint().await.map_err(|e| ExitError::failure(e.to_string()))?;

            if outcome.deduplicated {
                println!("{} (existing run)", outcome.experiment_id);
            } else {
                println!(
                    "{}: {:?} exit={:?} artifacts={}",
                    outcome.experiment_id,
                    outcome.status,
                    outcome.exit_code,
                    outcome.run_dir.display()
                );
            }
            Ok(())
        }

        ExperimentCommand::Ls => {
            let store = TeamMemory::open(&paths.runtime, HashMap::new())
                .map_err(|e| ExitError::failure(e.to_string()))?;
            let now = SystemClock.epoch_ms();
            let mut all = store.reader().experiments();
            all.sort_by_key(|r| r.created_at_ms);
            let rows: Vec<Vec<String>> = all
                .iter()
                .map(|r| {
                    vec![
                        r.experiment_id.to_string(),
                        r.profile.clone(),
                        format!("{:?}", r.status),
                        r.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                        output::age(now, r.created_at_ms),
                    ]
                })
                .collect();
            output::table(&["RUN", "PROFILE", "STATUS", "EXIT", "AGE"], &rows);
            Ok(())
        }
    }
}
