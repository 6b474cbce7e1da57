// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async writer worker for the Evidence Ledger.
//!
//! All mutation funnels through one task. When the worker cannot take a
//! write (channel full or worker down), the record lands on the durable
//! spool and the caller gets `{accepted, queued}`; a `ledger.flushed`
//! broadcast fires when the spool drains. Queued writes must not be
//! treated as committed before that signal.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use troupe_core::LedgerEvent;

use super::{EvidenceLedger, LedgerError, LedgerReader, PruneReport};
use crate::spool::Spool;

const COMMAND_BUFFER: usize = 256;

/// What the caller learns about a submitted write.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    pub accepted: bool,
    /// True when the event is durably in the WAL with its sequence set.
    pub committed: bool,
    /// True when the event is on the spool awaiting the writer.
    pub queued: bool,
    /// The committed event (sequence assigned); `None` while queued.
    pub event: Option<LedgerEvent>,
}

enum Command {
    Append {
        event: LedgerEvent,
        reply: oneshot::Sender<Result<AppendReceipt, LedgerError>>,
    },
    DrainSpool,
    Protect(Vec<Uuid>),
    Prune {
        now_ms: u64,
        reply: oneshot::Sender<Result<PruneReport, LedgerError>>,
    },
    Flush,
}

/// Cloneable handle submitting writes to the worker.
#[derive(Clone)]
pub struct LedgerWriterHandle {
    tx: mpsc::Sender<Command>,
    spool: Arc<Spool<LedgerEvent>>,
    flushed_tx: broadcast::Sender<usize>,
}

impl LedgerWriterHandle {
    /// Submit one event. Falls back to the spool when the worker cannot
    /// take it; never drops an accepted write.
    pub async fn append(&self, event: LedgerEvent) -> Result<AppendReceipt, LedgerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = Command::Append { event, reply: reply_tx };
        match self.tx.try_send(command) {
            Ok(()) => match reply_rx.await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::WriterUnavailable),
            },
            Err(err) => {
                let event = match err.into_inner() {
                    Command::Append { event, .. } => event,
                    _ => return Err(LedgerError::WriterUnavailable),
                };
                self.spool.push(&event).map_err(|e| {
                    warn!(error = %e, "ledger spool push failed");
                    LedgerError::WriterUnavailable
                })?;
                Ok(AppendReceipt { accepted: true, committed: false, queued: true, event: None })
            }
        }
    }

    /// Ask the worker to drain any spooled writes now.
    pub async fn drain_spool(&self) {
        let _ = self.tx.send(Command::DrainSpool).await;
    }

    /// Mark event ids the pruner must retain.
    pub async fn protect(&self, ids: Vec<Uuid>) {
        let _ = self.tx.send(Command::Protect(ids)).await;
    }

    pub async fn prune(&self, now_ms: u64) -> Result<PruneReport, LedgerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Prune { now_ms, reply: reply_tx })
            .await
            .map_err(|_| LedgerError::WriterUnavailable)?;
        reply_rx.await.map_err(|_| LedgerError::WriterUnavailable)?
    }

    pub async fn flush(&self) {
        let _ = self.tx.send(Command::Flush).await;
    }

    /// Fires with the drained count each time the spool empties into the WAL.
    pub fn subscribe_flushed(&self) -> broadcast::Receiver<usize> {
        self.flushed_tx.subscribe()
    }
}

/// Spawn the writer worker. Returns the handle, a reader, and the task.
pub fn spawn_writer(
    mut ledger: EvidenceLedger,
    spool_path: &Path,
) -> (LedgerWriterHandle, LedgerReader, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let spool = Arc::new(Spool::new(spool_path));
    let (flushed_tx, _) = broadcast::channel(16);
    let reader = ledger.reader();

    let handle = LedgerWriterHandle {
        tx,
        spool: Arc::clone(&spool),
        flushed_tx: flushed_tx.clone(),
    };

    let task = tokio::spawn(async move {
        // Recovery: anything spooled before this worker started.
        drain(&mut ledger, &spool, &flushed_tx);

        while let Some(command) = rx.recv().await {
            match command {
                Command::Append { event, reply } => {
                    let result = ledger.append(event).map(|event| AppendReceipt {
                        accepted: true,
                        committed: true,
                        queued: false,
                        event: Some(event),
                    });
                    let _ = reply.send(result);
                }
                Command::DrainSpool => drain(&mut ledger, &spool, &flushed_tx),
                Command::Protect(ids) => ledger.protect(ids),
                Command::Prune { now_ms, reply } => {
                    let _ = reply.send(ledger.prune(now_ms));
                }
                Command::Flush => {
                    if let Err(e) = ledger.flush() {
                        warn!(error = %e, "ledger flush failed");
                    }
                }
            }
        }
        // Channel closed: final flush before the worker exits.
        if let Err(e) = ledger.flush() {
            warn!(error = %e, "ledger final flush failed");
        }
    });

    (handle, reader, task)
}

/// Drain the spool in order, then truncate and signal `ledger.flushed`.
fn drain(
    ledger: &mut EvidenceLedger,
    spool: &Spool<LedgerEvent>,
    flushed_tx: &broadcast::Sender<usize>,
) {
    let pending = match spool.drain_pending() {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "ledger spool read failed");
            return;
        }
    };
    if pending.is_empty() {
        return;
    }
    let mut drained = 0;
    for event in pending {
        match ledger.append(event) {
            Ok(_) => drained += 1,
            // Replay after a crash mid-drain: already committed.
            Err(LedgerError::DuplicateEventId(_)) => drained += 1,
            Err(e) => {
                warn!(error = %e, "spooled event rejected");
            }
        }
    }
    if let Err(e) = ledger.flush() {
        warn!(error = %e, "ledger flush after drain failed");
        return;
    }
    if let Err(e) = spool.truncate() {
        warn!(error = %e, "spool truncate failed");
        return;
    }
    debug!(drained, "ledger spool drained");
    let _ = flushed_tx.send(drained);
}
