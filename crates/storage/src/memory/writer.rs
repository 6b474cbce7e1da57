// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async writer worker for Team Memory.
//!
//! Same discipline as the ledger writer: one task owns the store, callers
//! go through a cloneable handle. The agent-driven hot paths (claim
//! creation, evidence, consensus) spool when the worker cannot take them;
//! recovery drains the spool with idempotency keys honored.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

use troupe_core::claim::{Claim, ClaimEvidence, ClaimId, ClaimStatus};
use troupe_core::{ConsensusPosition, EvidenceRelation, Role};

use super::op::MemoryOp;
use super::{CreateClaim, CreateClaimOutcome, MemoryError, MemoryReader, TeamMemory};
use crate::spool::Spool;

const COMMAND_BUFFER: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, MemoryError>>;

enum Command {
    CreateClaim { params: CreateClaim, now_ms: u64, reply: Reply<CreateClaimOutcome> },
    UpdateStatus {
        claim_id: ClaimId,
        next: ClaimStatus,
        changed_by: Role,
        reason: String,
        now_ms: u64,
        reply: Reply<()>,
    },
    RecordConsensus {
        claim_id: ClaimId,
        agent: Role,
        position: ConsensusPosition,
        reason: String,
        now_ms: u64,
        reply: Reply<Option<ClaimStatus>>,
    },
    AddEvidence {
        claim_id: ClaimId,
        event_ref: String,
        relation: EvidenceRelation,
        added_by: Role,
        now_ms: u64,
        reply: Reply<()>,
    },
    /// Escape hatch for the remaining (coordinator-driven) operations.
    WithStore(Box<dyn FnOnce(&mut TeamMemory) + Send>),
    DrainSpool,
    Checkpoint { reply: Reply<()> },
}

/// Cloneable handle submitting writes to the memory worker.
#[derive(Clone)]
pub struct TeamMemoryHandle {
    tx: mpsc::Sender<Command>,
    spool: Arc<Spool<MemoryOp>>,
    flushed_tx: broadcast::Sender<usize>,
}

impl TeamMemoryHandle {
    pub async fn create_claim(
        &self,
        params: CreateClaim,
        now_ms: u64,
    ) -> Result<CreateClaimOutcome, MemoryError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::CreateClaim { params, now_ms, reply };
        match self.tx.try_send(command) {
            Ok(()) => rx.await.map_err(|_| MemoryError::WriterUnavailable)?,
            Err(err) => {
                // Writer down: pre-assign the id and spool the op. Replay
                // dedupes on the idempotency key.
                let (params, now_ms) = match err.into_inner() {
                    Command::CreateClaim { params, now_ms, .. } => (params, now_ms),
                    _ => return Err(MemoryError::WriterUnavailable),
                };
                let claim = Claim {
                    claim_id: ClaimId::new(),
                    idempotency_key: params.idempotency_key,
                    statement: params.statement,
                    claim_type: params.claim_type,
                    owner_role: params.owner_role,
                    confidence: params.confidence,
                    status: ClaimStatus::Proposed,
                    supersedes: params.supersedes,
                    session: params.session,
                    ttl_hours: params.ttl_hours,
                    created_at_ms: now_ms,
                    updated_at_ms: now_ms,
                };
                let claim_id = claim.claim_id;
                self.spool
                    .push(&MemoryOp::ClaimCreated { claim, scopes: params.scopes })
                    .map_err(|e| {
                        warn!(error = %e, "memory spool push failed");
                        MemoryError::WriterUnavailable
                    })?;
                Ok(CreateClaimOutcome { claim_id, deduplicated: false })
            }
        }
    }

    pub async fn update_claim_status(
        &self,
        claim_id: ClaimId,
        next: ClaimStatus,
        changed_by: Role,
        reason: &str,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::UpdateStatus {
                claim_id,
                next,
                changed_by,
                reason: reason.to_string(),
                now_ms,
                reply,
            })
            .await
            .map_err(|_| MemoryError::WriterUnavailable)?;
        rx.await.map_err(|_| MemoryError::WriterUnavailable)?
    }

    pub async fn record_consensus(
        &self,
        claim_id: ClaimId,
        agent: Role,
        position: ConsensusPosition,
        reason: &str,
        now_ms: u64,
    ) -> Result<Option<ClaimStatus>, MemoryError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::RecordConsensus {
            claim_id,
            agent,
            position,
            reason: reason.to_string(),
            now_ms,
            reply,
        };
        match self.tx.try_send(command) {
            Ok(()) => rx.await.map_err(|_| MemoryError::WriterUnavailable)?,
            Err(err) => {
                let op = match err.into_inner() {
                    Command::RecordConsensus { claim_id, agent, position, reason, now_ms, .. } => {
                        MemoryOp::ConsensusRecorded { claim_id, agent, position, reason, at_ms: now_ms }
                    }
                    _ => return Err(MemoryError::WriterUnavailable),
                };
                self.spool.push(&op).map_err(|_| MemoryError::WriterUnavailable)?;
                Ok(None)
            }
        }
    }

    pub async fn add_evidence(
        &self,
        claim_id: ClaimId,
        event_ref: &str,
        relation: EvidenceRelation,
        added_by: Role,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::AddEvidence {
            claim_id,
            event_ref: event_ref.to_string(),
            relation,
            added_by,
            now_ms,
            reply,
        };
        match self.tx.try_send(command) {
            Ok(()) => rx.await.map_err(|_| MemoryError::WriterUnavailable)?,
            Err(err) => {
                let op = match err.into_inner() {
                    Command::AddEvidence { claim_id, event_ref, relation, added_by, now_ms, .. } => {
                        MemoryOp::EvidenceAdded {
                            evidence: ClaimEvidence {
                                claim_id,
                                evidence_event_ref: event_ref,
                                relation,
                                weight: 1.0,
                                added_by,
                                added_at_ms: now_ms,
                            },
                        }
                    }
                    _ => return Err(MemoryError::WriterUnavailable),
                };
                self.spool.push(&op).map_err(|_| MemoryError::WriterUnavailable)?;
                Ok(())
            }
        }
    }

    /// Run an arbitrary operation on the store inside the writer task.
    pub async fn with_store<F, T>(&self, f: F) -> Result<T, MemoryError>
    where
        F: FnOnce(&mut TeamMemory) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel::<T>();
        let boxed: Box<dyn FnOnce(&mut TeamMemory) + Send> = Box::new(move |store| {
            let _ = reply.send(f(store));
        });
        self.tx
            .send(Command::WithStore(boxed))
            .await
            .map_err(|_| MemoryError::WriterUnavailable)?;
        rx.await.map_err(|_| MemoryError::WriterUnavailable)
    }

    pub async fn drain_spool(&self) {
        let _ = self.tx.send(Command::DrainSpool).await;
    }

    pub async fn checkpoint(&self) -> Result<(), MemoryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Checkpoint { reply })
            .await
            .map_err(|_| MemoryError::WriterUnavailable)?;
        rx.await.map_err(|_| MemoryError::WriterUnavailable)?
    }

    pub fn subscribe_flushed(&self) -> broadcast::Receiver<usize> {
        self.flushed_tx.subscribe()
    }
}

/// Spawn the memory writer worker.
pub fn spawn_memory_writer(
    mut store: TeamMemory,
    spool_path: &Path,
) -> (TeamMemoryHandle, MemoryReader, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let spool = Arc::new(Spool::new(spool_path));
    let (flushed_tx, _) = broadcast::channel(16);
    let reader = store.reader();

    let handle = TeamMemoryHandle { tx, spool: Arc::clone(&spool), flushed_tx: flushed_tx.clone() };

    let task = tokio::spawn(async move {
        drain(&mut store, &spool, &flushed_tx);

        while let Some(command) = rx.recv().await {
            match command {
                Command::CreateClaim { params, now_ms, reply } => {
                    let _ = reply.send(store.create_claim(params, now_ms));
                }
                Command::UpdateStatus { claim_id, next, changed_by, reason, now_ms, reply } => {
                    let _ = reply.send(store.update_claim_status(
                        claim_id, next, changed_by, &reason, now_ms,
                    ));
                }
                Command::RecordConsensus { claim_id, agent, position, reason, now_ms, reply } => {
                    let _ = reply.send(store.record_consensus(
                        claim_id, agent, position, &reason, now_ms,
                    ));
                }
                Command::AddEvidence { claim_id, event_ref, relation, added_by, now_ms, reply } => {
                    let _ = reply.send(store.add_evidence(
                        claim_id, &event_ref, relation, 1.0, added_by, now_ms,
                    ));
                }
                Command::WithStore(f) => f(&mut store),
                Command::DrainSpool => drain(&mut store, &spool, &flushed_tx),
                Command::Checkpoint { reply } => {
                    let _ = reply.send(store.checkpoint());
                }
            }
        }
        if let Err(e) = store.flush() {
            warn!(error = %e, "memory final flush failed");
        }
    });

    (handle, reader, task)
}

fn drain(store: &mut TeamMemory, spool: &Spool<MemoryOp>, flushed_tx: &broadcast::Sender<usize>) {
    let pending = match spool.drain_pending() {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "memory spool read failed");
            return;
        }
    };
    if pending.is_empty() {
        return;
    }
    let mut drained = 0;
    for op in pending {
        match store.apply_spooled(op) {
            Ok(()) => drained += 1,
            Err(e) => warn!(error = %e, "spooled memory op rejected"),
        }
    }
    if let Err(e) = store.flush() {
        warn!(error = %e, "memory flush after drain failed");
        return;
    }
    if let Err(e) = spool.truncate() {
        warn!(error = %e, "memory spool truncate failed");
        return;
    }
    let _ = flushed_tx.send(drained);
}
