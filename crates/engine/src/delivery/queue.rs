// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pane FIFO queue of deferred delivery intents.
//!
//! Gate deferrals (focus lock, compaction) park envelopes here with a TTL.
//! The queue drains strictly FIFO when a gate clears, re-checking gates on
//! each dequeue; TTL expiry drops with a typed reason. No envelope is ever
//! dequeued twice.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use troupe_core::{DeliveryOutcome, MessageEnvelope};

/// A parked envelope plus the caller awaiting its terminal outcome.
#[derive(Debug)]
pub struct DeferredIntent {
    pub envelope: MessageEnvelope,
    pub parked_at_ms: u64,
    pub resolve: oneshot::Sender<DeliveryOutcome>,
}

/// Bounded FIFO of deferred intents for one pane.
pub struct DeferQueue {
    items: VecDeque<DeferredIntent>,
    cap: usize,
    ttl_ms: u64,
}

impl DeferQueue {
    pub fn new(cap: usize, ttl_ms: u64) -> Self {
        Self { items: VecDeque::new(), cap, ttl_ms }
    }

    /// Park an intent. Returns the intent back when the queue is full.
    pub fn push(&mut self, intent: DeferredIntent) -> Result<(), DeferredIntent> {
        if self.items.len() >= self.cap {
            return Err(intent);
        }
        self.items.push_back(intent);
        Ok(())
    }

    /// Drop expired intents, resolving each with `dropped.ttl`.
    pub fn expire(&mut self, now_ms: u64) -> usize {
        let ttl = self.ttl_ms;
        let mut dropped = 0;
        while let Some(front) = self.items.front() {
            if now_ms.saturating_sub(front.parked_at_ms) <= ttl {
                break;
            }
            if let Some(intent) = self.items.pop_front() {
                let _ = intent
                    .resolve
                    .send(DeliveryOutcome::Dropped(troupe_core::outcome::DropReason::Ttl));
                dropped += 1;
            }
        }
        // TTL can expire out of FIFO order only if parked_at is unordered,
        // which push prevents; a single front-scan is sufficient.
        dropped
    }

    pub fn pop(&mut self) -> Option<DeferredIntent> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
