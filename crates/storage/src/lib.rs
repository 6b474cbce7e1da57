// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! troupe-storage: the two single-writer stores.
//!
//! Both the Evidence Ledger and Team Memory sit on the same substrate: an
//! append-only JSON-lines WAL, a durable spool for writes submitted while
//! the writer is down, and a zstd-compressed snapshot checkpoint. Readers
//! never touch the files; they query the in-memory materialized state.

pub mod ledger;
pub mod memory;
pub mod snapshot;
pub mod spool;
pub mod wal;

pub use ledger::{
    spawn_writer, AppendReceipt, EvidenceLedger, LedgerError, LedgerQuery, LedgerReader,
    LedgerState, LedgerWriterHandle, PruneReport, RetentionCaps,
};
pub use memory::{
    spawn_memory_writer, ClaimQuery, ConsensusEdge, CreateClaim, CreateClaimOutcome, MemoryError,
    MemoryOp, MemoryReader, MemoryState, OrphanReport, TeamMemory, TeamMemoryHandle,
};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use spool::{Spool, SpoolError};
pub use wal::{Wal, WalEntry, WalError};
