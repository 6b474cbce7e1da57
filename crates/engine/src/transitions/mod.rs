// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition ledger: stateful envelopes tracking multi-event operations.
//!
//! Every event carrying a correlation id joins the matching open
//! transition as classified evidence. An owner lease serializes mutation
//! phases; other modules may only contribute passive evidence. A ring of
//! the last 500 transitions is retained, evicting oldest closed records
//! first; open transitions never evict.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use troupe_core::{
    Clock, CorrelationId, EvidenceClass, EvidenceSpec, EventKind, LedgerEvent, OwnerLease,
    PaneId, Phase, Transition, TransitionId, TransitionOutcome,
};
use troupe_core::transition::{PhaseChange, TransitionOrigin, Verification};

/// Ring capacity.
const RING_CAP: usize = 500;
/// Default owner lease TTL.
const LEASE_TTL_MS: u64 = 15_000;

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("transition {0} not found")]
    NotFound(TransitionId),

    #[error("phase {from:?} cannot advance to {to:?}")]
    InvalidPhase { from: Phase, to: Phase },

    #[error("ownership_conflict: {phase:?} requires the owner lease")]
    OwnershipConflict { phase: Phase },

    #[error("owner_lease_expired")]
    OwnerLeaseExpired,

    #[error("transition {0} is closed")]
    Closed(TransitionId),
}

/// Parameters for opening a transition.
#[derive(Debug, Clone)]
pub struct OpenTransition {
    pub correlation_id: CorrelationId,
    pub pane_id: Option<PaneId>,
    pub category: String,
    pub intent_type: String,
    pub transition_type: String,
    pub origin: TransitionOrigin,
    pub evidence_spec: EvidenceSpec,
    pub preconditions: Vec<String>,
}

/// The in-memory ring of transitions, owned by the delivery engine process.
pub struct TransitionLedger<C: Clock> {
    ring: Mutex<VecDeque<Transition>>,
    clock: C,
}

impl<C: Clock> TransitionLedger<C> {
    pub fn new(clock: C) -> Self {
        Self { ring: Mutex::new(VecDeque::new()), clock }
    }

    /// Open a new transition in `requested` phase.
    pub fn open(&self, params: OpenTransition) -> TransitionId {
        let now = self.clock.epoch_ms();
        let mut transition = Transition::new(params.correlation_id, params.origin, now);
        transition.pane_id = params.pane_id;
        transition.category = params.category;
        transition.intent_type = params.intent_type;
        transition.transition_type = params.transition_type;
        transition.evidence_spec = params.evidence_spec;
        transition.preconditions = params.preconditions;
        let id = transition.transition_id;

        let mut ring = self.ring.lock();
        if ring.len() >= RING_CAP {
            // Evict the oldest closed record; open transitions never evict.
            if let Some(index) = ring.iter().position(|t| t.closed) {
                ring.remove(index);
            }
        }
        ring.push_back(transition);
        id
    }

    /// Acquire (or steal an expired) owner lease for mutation phases.
    pub fn acquire_lease(&self, id: TransitionId, module: &str) -> Result<Uuid, TransitionError> {
        let now = self.clock.epoch_ms();
        let mut ring = self.ring.lock();
        let transition = find_mut(&mut ring, id)?;
        if transition.closed {
            return Err(TransitionError::Closed(id));
        }
        match &transition.owner {
            Some(lease) if !lease.expired(now) && lease.module != module => {
                Err(TransitionError::OwnershipConflict { phase: transition.phase })
            }
            Some(lease) if !lease.expired(now) => Ok(lease.lease_id),
            _ => {
                let lease = OwnerLease {
                    module: module.to_string(),
                    lease_id: Uuid::new_v4(),
                    acquired_at_ms: now,
                    lease_ttl_ms: LEASE_TTL_MS,
                };
                let lease_id = lease.lease_id;
                transition.owner = Some(lease);
                Ok(lease_id)
            }
        }
    }

    /// Drive a phase change. Mutation phases require the valid owner lease.
    pub fn advance(
        &self,
        id: TransitionId,
        to: Phase,
        lease: Option<Uuid>,
        reason: Option<&str>,
    ) -> Result<(), TransitionError> {
        let now = self.clock.epoch_ms();
        let mut ring = self.ring.lock();
        let transition = find_mut(&mut ring, id)?;
        if transition.closed {
            return Err(TransitionError::Closed(id));
        }
        let from = transition.phase;
        if !from.can_advance_to(to) {
            return Err(TransitionError::InvalidPhase { from, to });
        }
        if to.is_owner_mutation() {
            let owner = transition
                .owner
                .as_ref()
                .ok_or(TransitionError::OwnershipConflict { phase: to })?;
            if lease != Some(owner.lease_id) {
                return Err(TransitionError::OwnershipConflict { phase: to });
            }
            if owner.expired(now) {
                return Err(TransitionError::OwnerLeaseExpired);
            }
        }
        transition.phase = to;
        transition.phase_history.push(PhaseChange {
            from,
            to,
            at_ms: now,
            reason: reason.map(str::to_string),
        });
        transition.reason_code = reason.map(str::to_string).or(transition.reason_code.take());
        transition.updated_at_ms = now;
        if to.is_terminal() {
            transition.closed = true;
        }
        Ok(())
    }

    /// Join an event to its open transition as classified evidence.
    ///
    /// `during_confirmed_compaction` marks pane output produced while the
    /// target was compacting; such signals are disallowed evidence.
    pub fn record_event(&self, event: &LedgerEvent, during_confirmed_compaction: bool) {
        let mut ring = self.ring.lock();
        let transition = ring
            .iter_mut()
            .rev()
            .find(|t| !t.closed && t.correlation_id == event.correlation_id);
        let transition = match transition {
            Some(t) => t,
            None => return,
        };
        let class = if during_confirmed_compaction
            && matches!(event.kind, EventKind::PtyDataReceived)
        {
            EvidenceClass::Disallowed
        } else {
            classify(&event.kind, &transition.evidence_spec)
        };
        if class != EvidenceClass::None {
            transition.evidence.push((event.event_id, event.kind.clone(), class));
            transition.updated_at_ms = self.clock.epoch_ms();
        }
    }

    /// Finalize from observed evidence. Policy: any disallowed → failed;
    /// any strong → verified; weak allowed by the evidence spec → riskedPass; else
    /// timed out.
    pub fn finalize(&self, id: TransitionId, lease: Option<Uuid>) -> Result<TransitionOutcome, TransitionError> {
        let (observed, allow_weak, phase) = {
            let mut ring = self.ring.lock();
            let transition = find_mut(&mut ring, id)?;
            (
                transition.observed_class(),
                transition.evidence_spec.required_class <= EvidenceClass::Weak,
                transition.phase,
            )
        };

        let (outcome, terminal_phase) = match observed {
            EvidenceClass::Disallowed => (TransitionOutcome::Failed, Phase::Failed),
            EvidenceClass::Strong => (TransitionOutcome::Verified, Phase::Verified),
            EvidenceClass::Weak if allow_weak => (TransitionOutcome::RiskedPass, Phase::Verified),
            _ => (TransitionOutcome::TimedOut, Phase::TimedOut),
        };

        // Walk to the terminal phase through legal edges only.
        if phase == Phase::Applied {
            self.advance(id, Phase::Verifying, lease, None)?;
        }
        let from = self.phase(id)?;
        let target = match from {
            Phase::Requested | Phase::Deferred => Phase::Dropped,
            from if from.can_advance_to(terminal_phase) => terminal_phase,
            _ => Phase::Failed,
        };
        self.advance(id, target, lease, None)?;

        let now = self.clock.epoch_ms();
        let mut ring = self.ring.lock();
        let transition = find_mut(&mut ring, id)?;
        transition.verification = Some(Verification {
            outcome,
            observed_class: observed,
            confidence: match observed {
                EvidenceClass::Strong => 0.97,
                EvidenceClass::Weak => 0.6,
                _ => 0.0,
            },
            verified_at_ms: now,
        });
        Ok(outcome)
    }

    pub fn phase(&self, id: TransitionId) -> Result<Phase, TransitionError> {
        let ring = self.ring.lock();
        ring.iter()
            .find(|t| t.transition_id == id)
            .map(|t| t.phase)
            .ok_or(TransitionError::NotFound(id))
    }

    pub fn get(&self, id: TransitionId) -> Option<Transition> {
        self.ring.lock().iter().find(|t| t.transition_id == id).cloned()
    }

    pub fn find_open(&self, correlation: &CorrelationId) -> Option<Transition> {
        self.ring
            .lock()
            .iter()
            .rev()
            .find(|t| !t.closed && &t.correlation_id == correlation)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }
}

fn find_mut(
    ring: &mut VecDeque<Transition>,
    id: TransitionId,
) -> Result<&mut Transition, TransitionError> {
    ring.iter_mut()
        .find(|t| t.transition_id == id)
        .ok_or(TransitionError::NotFound(id))
}

/// Classify an event kind against a transition's evidence spec.
fn classify(kind: &EventKind, spec: &EvidenceSpec) -> EvidenceClass {
    let name = kind.as_str();
    if spec.disallowed_signals.iter().any(|s| s == name) {
        return EvidenceClass::Disallowed;
    }
    if spec.accepted_signals.iter().any(|s| s == name) {
        return EvidenceClass::Strong;
    }
    EvidenceClass::of(kind)
}

#[cfg(test)]
#[path = "transitions_tests.rs"]
mod tests;
