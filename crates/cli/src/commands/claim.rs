// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Team-memory claim surface.

use std::path::Path;

use clap::Subcommand;

use troupe_core::claim::{ClaimId, ClaimStatus, ClaimType};
use troupe_core::{Clock, ConsensusPosition, EvidenceRelation, SessionId, SystemClock};
use troupe_storage::{ClaimQuery, CreateClaim, TeamMemory};

use super::Paths;
use crate::exit_error::ExitError;
use crate::output;

#[derive(Subcommand)]
pub enum ClaimCommand {
    /// Record a new claim.
    Create {
        statement: String,
        #[arg(long, value_name = "fact|decision|hypothesis|negative", default_value = "fact")]
        claim_type: String,
        #[arg(long, default_value = "coordinator")]
        owner: String,
        #[arg(long = "scope")]
        scopes: Vec<String>,
        #[arg(long, default_value_t = 0.8)]
        confidence: f64,
        #[arg(long)]
        ttl_hours: Option<u32>,
        #[arg(long)]
        key: Option<String>,
    },
    /// List claims.
    Ls {
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "scope")]
        scopes: Vec<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one claim with edges and history.
    Show { id: String },
    /// Change a claim's status.
    Status {
        id: String,
        next: String,
        #[arg(long, default_value = "coordinator")]
        by: String,
        #[arg(long, default_value = "operator action")]
        reason: String,
    },
    /// Record an agent's consensus position.
    Consensus {
        id: String,
        agent: String,
        #[arg(value_name = "support|challenge|abstain")]
        position: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Attach ledger evidence to a claim.
    Evidence {
        id: String,
        event_ref: String,
        #[arg(value_name = "supports|contradicts|causedBy", default_value = "supports")]
        relation: String,
        #[arg(long, default_value = "coordinator")]
        by: String,
    },
}

fn parse_enum<T: serde::de::DeserializeOwned>(name: &str, value: &str) -> Result<T, ExitError> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| ExitError::invalid_input(format!("unknown {name} {value:?}")))
}

fn open(paths: &Paths, config: &troupe_core::TroupeConfig) -> Result<TeamMemory, ExitError> {
    let aliases = config
        .aliases
        .iter()
        .filter_map(|(alias, role)| role.parse().ok().map(|r| (alias.to_lowercase(), r)))
        .collect();
    TeamMemory::open(&paths.runtime, aliases).map_err(|e| ExitError::failure(e.to_string()))
}

pub async fn run(workspace: &Path, command: ClaimCommand) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let config = super::load_config(&paths)?;
    let mut memory = open(&paths, &config)?;
    let now = SystemClock.epoch_ms();

    match command {
        ClaimCommand::Create {
            statement,
            claim_type,
            owner,
            scopes,
            confidence,
            ttl_hours,
            key,
        } => {
            let claim_type: ClaimType = parse_enum("claim type", &claim_type)?;
            let owner = memory
                .normalize_agent(&owner)
                .map_err(|e| ExitError::invalid_input(e.to_string()))?;
            let outcome = memory
                .create_claim(
                    CreateClaim {
                        statement: statement.clone(),
                        claim_type,
                        owner_role: owner,
                        scopes,
                        confidence,
                        session: SessionId::new(),
                        ttl_hours,
                        supersedes: None,
                        idempotency_key: key.unwrap_or_else(|| statement.clone()),
                    },
                    now,
                )
                .map_err(|e| ExitError::failure(e.to_string()))?;
            memory.flush().map_err(|e| ExitError::failure(e.to_string()))?;
            if outcome.deduplicated {
                println!("{} (existing)", outcome.claim_id);
            } else {
                println!("{}", outcome.claim_id);
            }
            Ok(())
        }

        ClaimCommand::Ls { status, scopes, text, limit } => {
            let status = status
                .map(|s| parse_enum::<ClaimStatus>("status", &s))
                .transpose()?;
            let claims = memory.reader().query_claims(&ClaimQuery {
                scopes,
                status,
                text,
                limit: Some(limit),
                ..Default::default()
            });
            let rows: Vec<Vec<String>> = claims
                .iter()
                .map(|c| {
                    vec![
                        c.claim_id.to_string(),
                        c.status.to_string(),
                        format!("{:?}", c.claim_type).to_lowercase(),
                        c.owner_role.to_string(),
                        output::age(now, c.created_at_ms),
                        truncate(&c.statement, 60),
                    ]
                })
                .collect();
            output::table(&["CLAIM", "STATUS", "TYPE", "OWNER", "AGE", "STATEMENT"], &rows);
            Ok(())
        }

        ClaimCommand::Show { id } => {
            let claim_id = ClaimId::from_string(&id);
            let reader = memory.reader();
            let claim = reader
                .get_claim(&claim_id)
                .ok_or_else(|| ExitError::invalid_input(format!("claim {id} not found")))?;
            println!("{}  {}  {}", claim.claim_id, claim.status, claim.statement);
            println!("owner: {}  confidence: {}", claim.owner_role, claim.confidence);
            let scopes = reader.claim_scopes(&claim_id);
            if !scopes.is_empty() {
                println!("scopes: {}", scopes.join(", "));
            }
            for edge in reader.consensus(&claim_id) {
                println!("  {:?} by {} — {}", edge.position, edge.agent, edge.reason);
            }
            for row in reader.evidence(&claim_id) {
                println!("  {:?} via {}", row.relation, row.evidence_event_ref);
            }
            for change in reader.status_history(&claim_id) {
                println!("  {} -> {} ({}: {})", change.previous, change.next, change.changed_by, change.reason);
            }
            Ok(())
        }

        ClaimCommand::Status { id, next, by, reason } => {
            let next: ClaimStatus = parse_enum("status", &next)?;
            let by = memory
                .normalize_agent(&by)
                .map_err(|e| ExitError::invalid_input(e.to_string()))?;
            memory
                .update_claim_status(ClaimId::from_string(&id), next, by, &reason, now)
                .map_err(|e| ExitError::failure(e.to_string()))?;
            memory.flush().map_err(|e| ExitError::failure(e.to_string()))?;
            println!("{id}: {next}");
            Ok(())
        }

        ClaimCommand::Consensus { id, agent, position, reason } => {
            let position: ConsensusPosition = parse_enum("position", &position)?;
            let agent = memory
                .normalize_agent(&agent)
                .map_err(|e| ExitError::invalid_input(e.to_string()))?;
            let changed = memory
                .record_consensus(ClaimId::from_string(&id), agent, position, &reason, now)
                .map_err(|e| ExitError::failure(e.to_string()))?;
            memory.flush().map_err(|e| ExitError::failure(e.to_string()))?;
            match changed {
                Some(status) => println!("{id}: {status}"),
                None => println!("{id}: unchanged"),
            }
            Ok(())
        }

        ClaimCommand::Evidence { id, event_ref, relation, by } => {
            let relation: EvidenceRelation = parse_enum("relation", &relation)?;
            let by = memory
                .normalize_agent(&by)
                .map_err(|e| ExitError::invalid_input(e.to_string()))?;
            memory
                .add_evidence(ClaimId::from_string(&id), &event_ref, relation, 1.0, by, now)
                .map_err(|e| ExitError::failure(e.to_string()))?;
            memory.flush().map_err(|e| ExitError::failure(e.to_string()))?;
            println!("{id}: evidence attached");
            Ok(())
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
