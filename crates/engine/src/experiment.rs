// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Experiment engine: convert contested claims into executable proof.
//!
//! A run executes a named profile (never free-form shell) on an isolated
//! pane, captures artifacts to disk, enforces a hard deadline with a
//! process-tree kill, and binds the outcome into the Evidence Ledger.
//! The claim link stores only the event reference; tamper-evidence rests
//! on the ledger's append-only contract. One run at a time by default.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use troupe_core::claim::{ClaimId, EvidenceRelation, ExperimentId, ExperimentRecord, ExperimentStatus};
use troupe_core::{
    Clock, CorrelationId, EventKind, EventSource, LedgerEvent, PaneGeometry, PaneId, PaneSpec,
    Role, TroupeConfig,
};
use troupe_storage::{MemoryError, TeamMemoryHandle};

use crate::host::PaneHost;

/// Synthetic pane range for experiment runs.
const EXPERIMENT_PANE_BASE: u32 = 900;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("profile error: {0}")]
    Profile(#[from] troupe_core::config::ConfigError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("host error: {0}")]
    Host(#[from] crate::host::HostError),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Outcome handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentOutcome {
    pub experiment_id: ExperimentId,
    pub status: ExperimentStatus,
    pub exit_code: Option<i32>,
    pub run_dir: PathBuf,
    /// True when the (profile, args, revision, key) tuple matched an
    /// existing run and nothing executed.
    pub deduplicated: bool,
}

/// The experiment worker.
pub struct ExperimentEngine<H: PaneHost, C: Clock> {
    host: Arc<H>,
    memory: TeamMemoryHandle,
    ledger: troupe_storage::LedgerWriterHandle,
    config: Arc<TroupeConfig>,
    clock: C,
    experiments_dir: PathBuf,
    /// At most one concurrent run by default.
    slots: Semaphore,
    next_pane: parking_lot::Mutex<u32>,
}

impl<H: PaneHost, C: Clock> ExperimentEngine<H, C> {
    pub fn new(
        host: Arc<H>,
        memory: TeamMemoryHandle,
        ledger: troupe_storage::LedgerWriterHandle,
        config: Arc<TroupeConfig>,
        clock: C,
        experiments_dir: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            memory,
            ledger,
            config,
            clock,
            experiments_dir,
            slots: Semaphore::new(1),
            next_pane: parking_lot::Mutex::new(EXPERIMENT_PANE_BASE),
        })
    }

    /// Run a named profile and bind its outcome.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        self: &Arc<Self>,
        profile_id: &str,
        args: HashMap<String, String>,
        claim_id: Option<ClaimId>,
        relation: Option<EvidenceRelation>,
        requested_by: Role,
        repository_revision: &str,
        idempotency_key: &str,
    ) -> Result<ExperimentOutcome, ExperimentError> {
        let profile = self.config.profile(profile_id)?.clone();
        let argv = profile.render(profile_id, &args)?;
        let now = self.clock.epoch_ms();

        let dedup_key = run_key(profile_id, &args, repository_revision, idempotency_key);
        let record = ExperimentRecord {
            experiment_id: ExperimentId::new(),
            profile: profile_id.to_string(),
            args: args.clone(),
            claim_id,
            relation,
            requested_by,
            status: ExperimentStatus::Queued,
            idempotency_key: dedup_key.clone(),
            repository_revision: repository_revision.to_string(),
            run_dir: None,
            exit_code: None,
            evidence_event_ref: None,
            created_at_ms: now,
            updated_at_ms: now,
        };

        let (experiment_id, deduplicated) = self
            .memory
            .with_store(move |store| store.queue_experiment(record))
            .await??;
        if deduplicated {
            let existing = self
                .memory
                .with_store(move |store| store.reader().get_experiment(&experiment_id))
                .await?;
            let existing = existing.ok_or(MemoryError::ExperimentNotFound(experiment_id))?;
            return Ok(ExperimentOutcome {
                experiment_id,
                status: existing.status,
                exit_code: existing.exit_code,
                run_dir: existing.run_dir.unwrap_or_default(),
                deduplicated: true,
            });
        }

        // Single-flight: later requests queue here.
        let _permit = self.slots.acquire().await;
        self.execute(experiment_id, &argv, profile.timeout_ms, claim_id).await
    }

    async fn execute(
        self: &Arc<Self>,
        experiment_id: ExperimentId,
        argv: &[String],
        timeout_ms: u64,
        claim_id: Option<ClaimId>,
    ) -> Result<ExperimentOutcome, ExperimentError> {
        let run_dir = self.experiments_dir.join(experiment_id.suffix());
        std::fs::create_dir_all(&run_dir)?;
        let now = self.clock.epoch_ms();

        let pane_id = {
            let mut next = self.next_pane.lock();
            *next += 1;
            PaneId(*next)
        };
        let run_dir_for_store = run_dir.clone();
        self.memory
            .with_store(move |store| {
                store.set_experiment_status(experiment_id, ExperimentStatus::Running, None, now)
            })
            .await??;
        info!(experiment = %experiment_id, pane = %pane_id, "experiment running");

        // Isolated pane; raw output captured for artifacts.
        let mut data_rx = self.host.subscribe_data(true).await?;
        let spec = PaneSpec {
            pane_id,
            role: Role::Oracle,
            command: argv.to_vec(),
            env: HashMap::new(),
            geometry: PaneGeometry { cols: 200, rows: 50 },
            scrollback_bytes: 1024 * 1024,
        };
        self.host.spawn(spec, false).await?;

        let deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(deadline);
        let mut stdout = String::new();
        let mut timed_out = false;
        let exit_code;

        let down = self.host.await_down(pane_id);
        tokio::pin!(down);
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    timed_out = true;
                    // Hard deadline: kill the whole child tree.
                    let _ = self.host.kill(pane_id, "experiment_timeout").await;
                    exit_code = None;
                    break;
                }
                result = &mut down => {
                    exit_code = result.ok().and_then(|d| d.exit_code);
                    break;
                }
                chunk = data_rx.recv() => {
                    if let Some(chunk) = chunk {
                        if chunk.pane_id == pane_id {
                            if let Some(bytes) = chunk.bytes {
                                stdout.push_str(&bytes);
                            }
                        }
                    }
                }
            }
        }

        // Artifacts: stdout, stderr (merged by the PTY), meta.json.
        let stdout_path = run_dir.join("stdout.log");
        std::fs::write(&stdout_path, &stdout)?;
        std::fs::write(run_dir.join("stderr.log"), "")?;
        let stdout_hash = hex(Sha256::digest(stdout.as_bytes()));
        let meta = serde_json::json!({
            "experiment_id": experiment_id.as_str(),
            "argv": argv,
            "cwd": std::env::current_dir().ok(),
            "env_fingerprint": env_fingerprint(),
            "exit_code": exit_code,
            "timed_out": timed_out,
            "started_at_ms": now,
            "finished_at_ms": self.clock.epoch_ms(),
            "hashes": {"stdout": stdout_hash},
        });
        std::fs::write(run_dir.join("meta.json"), serde_json::to_vec_pretty(&meta)?)?;

        let status = if timed_out {
            ExperimentStatus::TimedOut
        } else if exit_code == Some(0) {
            ExperimentStatus::Succeeded
        } else {
            ExperimentStatus::Failed
        };
        let at = self.clock.epoch_ms();
        self.memory
            .with_store(move |store| {
                store.set_experiment_status(experiment_id, status, exit_code, at)?;
                store.set_experiment_status(experiment_id, ExperimentStatus::AttachPending, exit_code, at)
            })
            .await??;

        // Outcome event: hashes ride in the payload; the claim link keeps
        // only the reference.
        let event = LedgerEvent::new(
            EventKind::ExperimentCompleted,
            EventSource::Experiment,
            CorrelationId::new(),
        )
        .with_pane(pane_id)
        .with_payload(serde_json::json!({
            "experiment_id": experiment_id.as_str(),
            "exit_code": exit_code,
            "timed_out": timed_out,
            "stdout_hash": stdout_hash,
            "run_dir": run_dir_for_store.display().to_string(),
        }))
        .at(at);
        let receipt = self.ledger.append(event).await;
        let event_ref = match receipt {
            Ok(receipt) => receipt
                .event
                .map(|e| format!("evt:{}", e.event_id))
                .unwrap_or_else(|| format!("exp:{experiment_id}")),
            Err(e) => {
                warn!(error = %e, "experiment outcome append failed");
                format!("exp:{experiment_id}")
            }
        };

        let attach_ref = event_ref.clone();
        let changed = self
            .memory
            .with_store(move |store| store.attach_experiment(experiment_id, &attach_ref, at))
            .await??;
        if let (Some(claim), Some(status)) = (claim_id, changed) {
            info!(claim = %claim, status = %status, "claim resolved by experiment");
        }

        Ok(ExperimentOutcome {
            experiment_id,
            status,
            exit_code,
            run_dir,
            deduplicated: false,
        })
    }
}

/// Dedup key over (profile, args, revision, caller key).
pub fn run_key(
    profile: &str,
    args: &HashMap<String, String>,
    revision: &str,
    idempotency_key: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(profile.as_bytes());
    let mut sorted: Vec<_> = args.iter().collect();
    sorted.sort();
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(revision.as_bytes());
    hasher.update([0u8]);
    hasher.update(idempotency_key.as_bytes());
    hex(hasher.finalize())
}

fn hex(digest: impl AsRef<[u8]>) -> String {
    digest.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

/// Stable fingerprint of the environment variable names (values withheld:
/// they may carry secrets).
fn env_fingerprint() -> String {
    let mut names: Vec<String> = std::env::vars().map(|(k, _)| k).collect();
    names.sort();
    hex(Sha256::digest(names.join(",").as_bytes()))
}

#[cfg(test)]
#[path = "experiment_tests.rs"]
mod tests;
