// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The delivery engine: verified injection of message envelopes.
//!
//! A delivery either substantiates its effect (accepted write, submit,
//! verified output) or reports exactly what it could prove: a risked
//! pass on weak evidence, a trigger-file fallback, or a typed drop. At
//! most one terminal outcome is reported per message, and a duplicate
//! never reaches the daemon twice.

pub mod dedupe;
pub mod fallback;
pub mod queue;
pub mod transform;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use troupe_core::outcome::DropReason;
use troupe_core::transition::TransitionOrigin;
use troupe_core::{
    Clock, CorrelationId, DeliveryOutcome, EvidenceClass, EvidenceSpec, EventKind, EventSource,
    LedgerEvent, MessageEnvelope, MessageId, PaneId, Role, SessionId, Target, TroupeConfig,
};
use troupe_daemon::protocol::{EnterOutcome, WriteMode, WriteStatus};
use troupe_storage::LedgerWriterHandle;

use crate::compaction::CompactionDetector;
use crate::host::{PaneData, PaneHost};
use crate::transitions::{OpenTransition, TransitionLedger};

use dedupe::FingerprintLru;
use queue::{DeferQueue, DeferredIntent};

const MODULE: &str = "delivery-engine";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("target {0} resolves to no pane")]
    NoPane(Role),

    #[error("host error: {0}")]
    Host(#[from] crate::host::HostError),
}

/// What the caller learns about one delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub message_id: MessageId,
    pub outcome: DeliveryOutcome,
    pub correlation_id: CorrelationId,
}

/// Gate state and bookkeeping behind one short-lived mutex.
struct EngineState {
    dedupe: FingerprintLru,
    /// Highest sequence observed per (sender, session).
    last_sequence: HashMap<(Role, SessionId), u64>,
    queues: HashMap<PaneId, DeferQueue>,
    focus_locked: HashSet<PaneId>,
    /// ownership-exclusive: the message currently operating on a pane.
    owned: HashMap<PaneId, MessageId>,
    compaction: HashMap<PaneId, CompactionDetector>,
}

/// The delivery engine. One instance owns the transition map.
pub struct DeliveryEngine<H: PaneHost, C: Clock> {
    host: Arc<H>,
    ledger: LedgerWriterHandle,
    transitions: Arc<TransitionLedger<C>>,
    state: Mutex<EngineState>,
    config: Arc<TroupeConfig>,
    clock: C,
    triggers_dir: PathBuf,
}

impl<H: PaneHost, C: Clock + 'static> DeliveryEngine<H, C> {
    pub fn new(
        host: Arc<H>,
        ledger: LedgerWriterHandle,
        config: Arc<TroupeConfig>,
        clock: C,
        triggers_dir: PathBuf,
    ) -> Arc<Self> {
        let dedupe = FingerprintLru::new(config.delivery.dedup_window_ms);
        Arc::new(Self {
            host,
            ledger,
            transitions: Arc::new(TransitionLedger::new(clock.clone())),
            state: Mutex::new(EngineState {
                dedupe,
                last_sequence: HashMap::new(),
                queues: HashMap::new(),
                focus_locked: HashSet::new(),
                owned: HashMap::new(),
                compaction: HashMap::new(),
            }),
            config,
            clock,
            triggers_dir,
        })
    }

    pub fn transitions(&self) -> Arc<TransitionLedger<C>> {
        Arc::clone(&self.transitions)
    }

    // -- gate inputs --------------------------------------------------------

    /// User typing activity on a pane defers injects while held.
    pub async fn set_focus_lock(self: &Arc<Self>, pane_id: PaneId, locked: bool) {
        {
            let mut state = self.state.lock();
            if locked {
                state.focus_locked.insert(pane_id);
            } else {
                state.focus_locked.remove(&pane_id);
            }
        }
        if !locked {
            self.drain(pane_id).await;
        }
    }

    /// Feed one output observation into the pane's compaction detector.
    pub fn observe_output(&self, pane_id: PaneId, text: Option<&str>, byte_len: usize) {
        let now = self.clock.epoch_ms();
        let mut state = self.state.lock();
        state
            .compaction
            .entry(pane_id)
            .or_default()
            .observe_output(text, byte_len, now);
    }

    /// The target CLI signalled the end of compaction; release deferred work.
    pub async fn on_compaction_ended(self: &Arc<Self>, pane_id: PaneId) {
        let now = self.clock.epoch_ms();
        {
            let mut state = self.state.lock();
            state.compaction.entry(pane_id).or_default().end(now);
        }
        let correlation = CorrelationId::new();
        self.emit(
            LedgerEvent::new(EventKind::CompactionEnded, EventSource::Delivery, correlation)
                .with_pane(pane_id),
            false,
        )
        .await;
        self.drain(pane_id).await;
    }

    /// Expire parked intents past their TTL (called periodically).
    pub fn sweep_ttl(&self) {
        let now = self.clock.epoch_ms();
        let mut state = self.state.lock();
        for queue in state.queues.values_mut() {
            queue.expire(now);
        }
    }

    pub fn compaction_state(&self, pane_id: PaneId) -> crate::compaction::CompactionState {
        self.state
            .lock()
            .compaction
            .get(&pane_id)
            .map(|d| d.state())
            .unwrap_or(crate::compaction::CompactionState::None)
    }

    // -- delivery -----------------------------------------------------------

    /// Deliver an envelope to its target, fanning out group aliases.
    /// Returns the worst member outcome for groups.
    pub async fn deliver(self: &Arc<Self>, envelope: MessageEnvelope) -> DeliveryReport {
        let correlation = CorrelationId::new();
        let roles = envelope.target.resolve(envelope.from_role);
        if roles.is_empty() {
            return DeliveryReport {
                message_id: envelope.message_id,
                outcome: DeliveryOutcome::Dropped(DropReason::InvalidTarget),
                correlation_id: correlation,
            };
        }

        let mut worst: Option<DeliveryOutcome> = None;
        for role in roles {
            let mut member = envelope.clone();
            member.target = Target::Role(role);
            let outcome = self.deliver_one(member, role, correlation).await;
            worst = Some(match worst {
                Some(previous) if previous.severity() >= outcome.severity() => previous,
                _ => outcome,
            });
        }
        DeliveryReport {
            message_id: envelope.message_id,
            outcome: worst.unwrap_or(DeliveryOutcome::Dropped(DropReason::InvalidTarget)),
            correlation_id: correlation,
        }
    }

    async fn deliver_one(
        self: &Arc<Self>,
        mut envelope: MessageEnvelope,
        role: Role,
        correlation: CorrelationId,
    ) -> DeliveryOutcome {
        let pane_id = match role.default_pane() {
            Some(pane) => pane,
            None => return DeliveryOutcome::Dropped(DropReason::InvalidTarget),
        };
        let now = self.clock.epoch_ms();

        // 1. Normalize: a stale printed prefix inside the body is corrected
        //    to the envelope sequence and the mismatch recorded.
        if let Some((_, seq, rest)) = troupe_core::envelope::parse_printed_prefix(&envelope.body) {
            if seq != envelope.sequence_number {
                warn!(message = %envelope.message_id, body_seq = seq, envelope_seq = envelope.sequence_number, "prefix mismatch corrected");
                envelope.body = rest.to_string();
                self.emit(
                    LedgerEvent::new(EventKind::ContractViolation, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({
                            "violation": "sequence_prefix_mismatch",
                            "body_seq": seq,
                            "envelope_seq": envelope.sequence_number,
                        })),
                    false,
                )
                .await;
            } else {
                envelope.body = rest.to_string();
            }
        }

        // 2. Dedup window.
        let duplicate = {
            let mut state = self.state.lock();
            state.dedupe.check_and_insert(envelope.fingerprint(), now)
        };
        if duplicate {
            debug!(message = %envelope.message_id, "duplicate fingerprint");
            self.emit(
                LedgerEvent::new(EventKind::InjectDropped, EventSource::Delivery, correlation)
                    .with_pane(pane_id)
                    .with_payload(serde_json::json!({"reason": "duplicate"})),
                false,
            )
            .await;
            return DeliveryOutcome::Dropped(DropReason::Duplicate);
        }

        // 3. Sequence observation (never strict ordering enforcement).
        if envelope.sequence_number == 0 {
            return DeliveryOutcome::Dropped(DropReason::InvalidTarget);
        }
        let out_of_order = {
            let mut state = self.state.lock();
            let key = (envelope.from_role, envelope.sender_session);
            let last = state.last_sequence.entry(key).or_insert(0);
            let regressed = envelope.sequence_number <= *last;
            if !regressed {
                *last = envelope.sequence_number;
            }
            regressed
        };
        if out_of_order {
            self.emit(
                LedgerEvent::new(EventKind::ContractViolation, EventSource::Delivery, correlation)
                    .with_pane(pane_id)
                    .with_payload(serde_json::json!({
                        "violation": "sequence_out_of_order",
                        "sequence": envelope.sequence_number,
                    })),
                false,
            )
            .await;
        }

        // 4. Gates.
        let gate = {
            let state = self.state.lock();
            if state.owned.contains_key(&pane_id) {
                Some(GateDecision::Blocked)
            } else if state.focus_locked.contains(&pane_id) {
                Some(GateDecision::Defer("focus_locked"))
            } else if !envelope.priority.is_recovery()
                && state
                    .compaction
                    .get(&pane_id)
                    .map(|d| d.defers_inject())
                    .unwrap_or(false)
            {
                Some(GateDecision::Defer("compaction_in_progress"))
            } else {
                None
            }
        };

        match gate {
            Some(GateDecision::Blocked) => {
                self.emit(
                    LedgerEvent::new(EventKind::InjectDropped, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({"reason": "ownership_conflict"})),
                    false,
                )
                .await;
                DeliveryOutcome::Dropped(DropReason::OwnerConflict)
            }
            Some(GateDecision::Defer(reason)) => {
                self.emit(
                    LedgerEvent::new(EventKind::InjectDeferred, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({"reason": reason})),
                    false,
                )
                .await;
                let (resolve, resolved) = oneshot::channel();
                let parked = DeferredIntent { envelope, parked_at_ms: now, resolve };
                let push_result = {
                    let mut state = self.state.lock();
                    let config = &self.config.delivery;
                    state
                        .queues
                        .entry(pane_id)
                        .or_insert_with(|| DeferQueue::new(config.defer_queue_cap, config.defer_ttl_ms))
                        .push(parked)
                };
                match push_result {
                    Ok(()) => resolved
                        .await
                        .unwrap_or(DeliveryOutcome::Dropped(DropReason::Ttl)),
                    Err(_rejected) => {
                        self.emit(
                            LedgerEvent::new(
                                EventKind::InjectDropped,
                                EventSource::Delivery,
                                correlation,
                            )
                            .with_pane(pane_id)
                            .with_payload(serde_json::json!({"reason": "queue_full"})),
                            false,
                        )
                        .await;
                        DeliveryOutcome::Dropped(DropReason::QueueFull)
                    }
                }
            }
            None => self.inject(envelope, role, pane_id, correlation).await,
        }
    }

    /// Drain a pane's deferred queue in FIFO order, re-checking gates on
    /// each dequeue.
    async fn drain(self: &Arc<Self>, pane_id: PaneId) {
        loop {
            let next = {
                let mut state = self.state.lock();
                let gated = state.focus_locked.contains(&pane_id)
                    || state
                        .compaction
                        .get(&pane_id)
                        .map(|d| d.defers_inject())
                        .unwrap_or(false)
                    || state.owned.contains_key(&pane_id);
                if gated {
                    return;
                }
                state.queues.get_mut(&pane_id).and_then(|q| q.pop())
            };
            let intent = match next {
                Some(intent) => intent,
                None => return,
            };
            let role = match intent.envelope.target.as_role() {
                Some(role) => role,
                None => continue,
            };
            let correlation = CorrelationId::new();
            let outcome = self
                .inject(intent.envelope, role, pane_id, correlation)
                .await;
            let _ = intent.resolve.send(outcome);
        }
    }

    // -- injection protocol -------------------------------------------------

    async fn inject(
        self: &Arc<Self>,
        envelope: MessageEnvelope,
        role: Role,
        pane_id: PaneId,
        correlation: CorrelationId,
    ) -> DeliveryOutcome {
        // ownership-exclusive while this envelope drives the pane.
        {
            let mut state = self.state.lock();
            state.owned.insert(pane_id, envelope.message_id);
        }
        let outcome = self
            .inject_locked(&envelope, role, pane_id, correlation)
            .await;
        {
            let mut state = self.state.lock();
            state.owned.remove(&pane_id);
        }
        info!(message = %envelope.message_id, pane = %pane_id, outcome = %outcome, "delivery settled");
        outcome
    }

    async fn inject_locked(
        self: &Arc<Self>,
        envelope: &MessageEnvelope,
        role: Role,
        pane_id: PaneId,
        correlation: CorrelationId,
    ) -> DeliveryOutcome {
        let verification = self
            .config
            .roles
            .get(&role.to_string())
            .map(|r| r.verification.clone())
            .unwrap_or_default();
        let evidence_spec = EvidenceSpec {
            required_class: if verification.allow_weak {
                EvidenceClass::Weak
            } else {
                EvidenceClass::Strong
            },
            accepted_signals: verification.accepted_signals.clone(),
            disallowed_signals: verification.disallowed_signals.clone(),
        };

        let transition = self.transitions.open(OpenTransition {
            correlation_id: correlation,
            pane_id: Some(pane_id),
            category: "delivery".to_string(),
            intent_type: "inject".to_string(),
            transition_type: "message".to_string(),
            origin: TransitionOrigin {
                actor_type: "role".to_string(),
                role: Some(envelope.from_role),
                source: MODULE.to_string(),
            },
            evidence_spec,
            preconditions: vec!["focus-lock-guard".into(), "compaction-gate".into(), "ownership-exclusive".into()],
        });
        let lease = match self.transitions.acquire_lease(transition, MODULE) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(error = %e, "lease acquisition failed");
                self.emit(
                    LedgerEvent::new(EventKind::TransitionInvalid, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({"reason": "ownership_conflict"})),
                    false,
                )
                .await;
                return DeliveryOutcome::Dropped(DropReason::OwnerConflict);
            }
        };

        let requested = self
            .emit(
                LedgerEvent::new(EventKind::InjectRequested, EventSource::Delivery, correlation)
                    .with_pane(pane_id)
                    .with_payload(serde_json::json!({
                        "message_id": envelope.message_id.as_str(),
                        "from": envelope.from_role.to_string(),
                        "sequence": envelope.sequence_number,
                    })),
                false,
            )
            .await;
        let _ = self.transitions.advance(transition, troupe_core::Phase::Accepted, None, None);
        {
            let mut state = self.state.lock();
            state.compaction.entry(pane_id).or_default().note_injection(self.clock.epoch_ms());
        }

        // Transform & render the injected line.
        let chain = transform::default_chain();
        let transformed = transform::apply(&chain, &envelope.body);
        if !transformed.applied.is_empty() {
            self.emit(
                LedgerEvent::new(EventKind::InjectTransformApplied, EventSource::Delivery, correlation)
                    .with_pane(pane_id)
                    .with_cause(requested)
                    .with_payload(serde_json::json!({
                        "lossy": transformed.lossy,
                        "applied": transformed.applied,
                    })),
                false,
            )
            .await;
            if transformed.lossy {
                self.emit(
                    LedgerEvent::new(EventKind::ContractViolation, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({"violation": "transform_lossy", "severity": "warn"})),
                    false,
                )
                .await;
            }
        }
        let line = format!("{}{}", envelope.printed_prefix(), transformed.text);

        let mut attempt: u32 = 0;
        let max_attempts = self.config.delivery.retry_max_attempts;
        loop {
            match self
                .attempt_inject(envelope, pane_id, correlation, transition, lease, &line)
                .await
            {
                AttemptResult::Settled(outcome) => return outcome,
                AttemptResult::TargetOffline => {
                    return self
                        .fall_back(envelope, role, pane_id, correlation, transition, "target_offline")
                        .await;
                }
                AttemptResult::Retry => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return self
                            .fall_back(envelope, role, pane_id, correlation, transition, "verification_exhausted")
                            .await;
                    }
                    let base = self.config.delivery.retry_initial_ms << (attempt - 1);
                    let jitter = rand::thread_rng().gen_range(0..=base / 3);
                    tokio::time::sleep(Duration::from_millis(base + jitter)).await;
                }
            }
        }
    }

    async fn attempt_inject(
        self: &Arc<Self>,
        envelope: &MessageEnvelope,
        pane_id: PaneId,
        correlation: CorrelationId,
        transition: troupe_core::TransitionId,
        lease: Uuid,
        line: &str,
    ) -> AttemptResult {
        // Subscribe before writing: verification must not miss output the
        // submit produces immediately.
        let data_rx = self.host.subscribe_data(true).await.ok();

        // 5. Chunked write with ack barrier.
        let payload = format!("{line}\n");
        let write = self
            .host
            .write(pane_id, &payload, WriteMode::Chunked, Some(512))
            .await;
        let (status, acked) = match write {
            Ok(result) => result,
            Err(_) => return AttemptResult::TargetOffline,
        };
        self.emit(
            LedgerEvent::new(EventKind::DaemonWriteAck, EventSource::Delivery, correlation)
                .with_pane(pane_id)
                .with_payload(serde_json::json!({
                    "status": status,
                    "acked_bytes": acked,
                })),
            status.is_accepted(),
        )
        .await;

        match status {
            WriteStatus::Accepted if acked == payload.len() => {}
            WriteStatus::RejectedTerminalMissing | WriteStatus::RejectedNotAlive => {
                return AttemptResult::TargetOffline;
            }
            WriteStatus::BlockedGhostDedup => {
                // The daemon already has these bytes in flight.
                return AttemptResult::Settled(DeliveryOutcome::Dropped(DropReason::Duplicate));
            }
            _ => return AttemptResult::Retry,
        }
        let _ = self.transitions.advance(transition, troupe_core::Phase::Applied, Some(lease), None);

        // 6. Submit.
        let enter = self.host.send_trusted_enter(pane_id).await;
        self.emit(
            LedgerEvent::new(EventKind::InjectSubmitSent, EventSource::Delivery, correlation)
                .with_pane(pane_id)
                .with_payload(serde_json::json!({"message_id": envelope.message_id.as_str()})),
            false,
        )
        .await;
        let _ = self.transitions.advance(transition, troupe_core::Phase::Verifying, Some(lease), None);
        if matches!(enter, Ok(EnterOutcome::Rejected) | Err(_)) {
            return AttemptResult::TargetOffline;
        }

        // 7. Verify within the budget.
        match self.verify(pane_id, correlation, data_rx).await {
            VerifyResult::Strong => {
                self.emit(
                    LedgerEvent::new(EventKind::VerifyPass, EventSource::Delivery, correlation)
                        .with_pane(pane_id),
                    true,
                )
                .await;
                let _ = self.transitions.finalize(transition, Some(lease));
                AttemptResult::Settled(DeliveryOutcome::DeliveredVerified)
            }
            VerifyResult::Nothing | VerifyResult::CompactionOnly => {
                self.emit(
                    LedgerEvent::new(EventKind::VerifyFalsePositive, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({"acked_bytes": acked})),
                    false,
                )
                .await;
                let allow_weak = self
                    .transitions
                    .get(transition)
                    .map(|t| t.evidence_spec.required_class <= EvidenceClass::Weak)
                    .unwrap_or(false);
                if allow_weak {
                    let _ = self.transitions.finalize(transition, Some(lease));
                    AttemptResult::Settled(DeliveryOutcome::DeliveredRisked)
                } else {
                    AttemptResult::Retry
                }
            }
        }
    }

    /// Observe the pane's output stream inside the verification budget.
    async fn verify(
        self: &Arc<Self>,
        pane_id: PaneId,
        correlation: CorrelationId,
        rx: Option<mpsc::Receiver<PaneData>>,
    ) -> VerifyResult {
        let budget = Duration::from_millis(self.config.delivery.verify_budget_ms);
        let mut rx = match rx {
            Some(rx) => rx,
            None => return VerifyResult::Nothing,
        };
        let deadline = tokio::time::sleep(budget);
        tokio::pin!(deadline);
        let mut saw_compaction_output = false;

        loop {
            let data: Option<PaneData> = tokio::select! {
                _ = &mut deadline => None,
                data = rx.recv() => data,
            };
            let data = match data {
                Some(data) => data,
                None => {
                    return if saw_compaction_output {
                        VerifyResult::CompactionOnly
                    } else {
                        VerifyResult::Nothing
                    }
                }
            };
            if data.pane_id != pane_id {
                continue;
            }
            self.observe_output(pane_id, data.bytes.as_deref(), data.byte_len);
            let compacting = {
                let state = self.state.lock();
                state
                    .compaction
                    .get(&pane_id)
                    .map(|d| d.defers_inject())
                    .unwrap_or(false)
            };
            // Record the raw observation as transition evidence.
            let event =
                LedgerEvent::new(EventKind::PtyDataReceived, EventSource::Daemon, correlation)
                    .with_pane(pane_id)
                    .at(self.clock.epoch_ms());
            self.transitions.record_event(&event, compacting);

            if data.meaningful {
                if compacting {
                    saw_compaction_output = true;
                    continue;
                }
                return VerifyResult::Strong;
            }
        }
    }

    /// Trigger-file fallback after primary-path failure.
    async fn fall_back(
        self: &Arc<Self>,
        envelope: &MessageEnvelope,
        role: Role,
        pane_id: PaneId,
        correlation: CorrelationId,
        transition: troupe_core::TransitionId,
        reason: &str,
    ) -> DeliveryOutcome {
        let _ = self.transitions.advance(transition, troupe_core::Phase::TimedOut, None, Some(reason));
        match fallback::write_trigger(&self.triggers_dir, role, envelope) {
            Ok(path) => {
                self.emit(
                    LedgerEvent::new(EventKind::TriggerWritten, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({
                            "path": path.display().to_string(),
                            "reason": reason,
                        })),
                    false,
                )
                .await;
                DeliveryOutcome::FallbackTriggered
            }
            Err(e) => {
                warn!(error = %e, "trigger fallback failed");
                self.emit(
                    LedgerEvent::new(EventKind::InjectFailed, EventSource::Delivery, correlation)
                        .with_pane(pane_id)
                        .with_payload(serde_json::json!({"reason": "fallback_unwritable"})),
                    false,
                )
                .await;
                DeliveryOutcome::AcceptedUnverified
            }
        }
    }

    /// Append to the ledger and feed the transition map. Returns the event
    /// id for causation chaining.
    async fn emit(&self, mut event: LedgerEvent, weak_evidence: bool) -> Uuid {
        event.timestamp_ms = self.clock.epoch_ms();
        let id = event.event_id;
        let compacting = event
            .pane_id
            .map(|pane| {
                let state = self.state.lock();
                state
                    .compaction
                    .get(&pane)
                    .map(|d| d.defers_inject())
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        self.transitions.record_event(&event, compacting && !weak_evidence);
        if let Err(e) = self.ledger.append(event).await {
            warn!(error = %e, "ledger append failed");
        }
        id
    }

    /// Pump host output into compaction detectors and TTL sweeps.
    pub fn spawn_observer(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx: Option<mpsc::Receiver<PaneData>> =
                engine.host.subscribe_data(true).await.ok();
            let mut sweep = tokio::time::interval(Duration::from_secs(5));
            loop {
                match rx.as_mut() {
                    Some(stream) => {
                        tokio::select! {
                            _ = sweep.tick() => engine.sweep_ttl(),
                            data = stream.recv() => match data {
                                Some(data) => engine.observe_output(
                                    data.pane_id,
                                    data.bytes.as_deref(),
                                    data.byte_len,
                                ),
                                None => rx = None,
                            },
                        }
                    }
                    None => {
                        sweep.tick().await;
                        engine.sweep_ttl();
                        rx = engine.host.subscribe_data(true).await.ok();
                    }
                }
            }
        })
    }
}

enum GateDecision {
    Defer(&'static str),
    Blocked,
}

enum AttemptResult {
    Settled(DeliveryOutcome),
    TargetOffline,
    Retry,
}

enum VerifyResult {
    /// Meaningful output not attributable to compaction.
    ///
    /// The default accepted-signal set carries an empirically measured
    /// false-positive rate of about 3% on echo-heavy CLIs; roles that need
    /// tighter guarantees narrow `accepted_signals` in config.
    Strong,
    CompactionOnly,
    Nothing,
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
