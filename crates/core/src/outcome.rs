// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery outcomes and the cross-component error taxonomy.
//!
//! Errors here are first-class outcomes, not exceptions: every public
//! operation returns one of these tags, and the coordinator surface prints
//! them verbatim. Nothing silently succeeds.

use serde::{Deserialize, Serialize};

/// Why an envelope was dropped before (or instead of) injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Ttl,
    Duplicate,
    QueueFull,
    PreconditionUnrecoverable,
    OwnerConflict,
    InvalidTarget,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Ttl => "ttl",
            DropReason::Duplicate => "duplicate",
            DropReason::QueueFull => "queue_full",
            DropReason::PreconditionUnrecoverable => "precondition_unrecoverable",
            DropReason::OwnerConflict => "owner_conflict",
            DropReason::InvalidTarget => "invalid_target",
        }
    }
}

/// Terminal delivery outcome reported to the caller. At most one per
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryOutcome {
    /// Submit confirmed by strong evidence.
    DeliveredVerified,
    /// Weak evidence only: accepted write + ack, no verified output.
    DeliveredRisked,
    /// Accepted by transport but the target never acknowledged.
    AcceptedUnverified,
    /// Trigger file written; effect must not be assumed immediate.
    FallbackTriggered,
    Dropped(DropReason),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            DeliveryOutcome::DeliveredVerified
                | DeliveryOutcome::DeliveredRisked
                | DeliveryOutcome::FallbackTriggered
        )
    }

    /// Severity order used when fanning out to group aliases: the caller
    /// receives the worst member outcome.
    pub fn severity(&self) -> u8 {
        match self {
            DeliveryOutcome::DeliveredVerified => 0,
            DeliveryOutcome::DeliveredRisked => 1,
            DeliveryOutcome::AcceptedUnverified => 2,
            DeliveryOutcome::FallbackTriggered => 3,
            DeliveryOutcome::Dropped(_) => 4,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            DeliveryOutcome::DeliveredVerified => "delivered.verified".to_string(),
            DeliveryOutcome::DeliveredRisked => "delivered.risked".to_string(),
            DeliveryOutcome::AcceptedUnverified => "accepted.unverified".to_string(),
            DeliveryOutcome::FallbackTriggered => "fallback.triggered".to_string(),
            DeliveryOutcome::Dropped(reason) => format!("dropped.{}", reason.as_str()),
        }
    }
}

impl From<DeliveryOutcome> for String {
    fn from(o: DeliveryOutcome) -> String {
        o.as_string()
    }
}

impl From<String> for DeliveryOutcome {
    fn from(s: String) -> Self {
        match s.as_str() {
            "delivered.verified" => DeliveryOutcome::DeliveredVerified,
            "delivered.risked" => DeliveryOutcome::DeliveredRisked,
            "accepted.unverified" => DeliveryOutcome::AcceptedUnverified,
            "fallback.triggered" => DeliveryOutcome::FallbackTriggered,
            "dropped.duplicate" => DeliveryOutcome::Dropped(DropReason::Duplicate),
            "dropped.ttl" => DeliveryOutcome::Dropped(DropReason::Ttl),
            "dropped.queue_full" => DeliveryOutcome::Dropped(DropReason::QueueFull),
            "dropped.owner_conflict" => DeliveryOutcome::Dropped(DropReason::OwnerConflict),
            "dropped.invalid_target" => DeliveryOutcome::Dropped(DropReason::InvalidTarget),
            _ => DeliveryOutcome::Dropped(DropReason::PreconditionUnrecoverable),
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Cross-component error taxonomy, grouped by kind rather than by the
/// module that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // -- transport --
    AuthFailed,
    TargetOffline,
    TargetSendFailed,
    Superseded,
    InvalidPayload,
    Unknown,
    // -- gate --
    FocusLocked,
    CompactionInProgress,
    OwnershipConflict,
    QueueFull,
    TtlExpired,
    // -- injection --
    WriteRejected,
    SubmitVerificationFailed,
    SubmitTimeout,
    TransformLossy,
    // -- store --
    SpoolQueued,
    IdempotentDuplicate,
    InvalidTransition,
    IntegrityOrphan,
    OwnerLeaseExpired,
    // -- process --
    CapacityReached,
    SlotUnavailable,
    ChildCrashed,
    ChildTimedOut,
    OrphanOnSync,
    OwnerBindingViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::TargetOffline => "target_offline",
            ErrorKind::TargetSendFailed => "target_send_failed",
            ErrorKind::Superseded => "superseded",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::Unknown => "unknown",
            ErrorKind::FocusLocked => "focus_locked",
            ErrorKind::CompactionInProgress => "compaction_in_progress",
            ErrorKind::OwnershipConflict => "ownership_conflict",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::TtlExpired => "ttl_expired",
            ErrorKind::WriteRejected => "write_rejected",
            ErrorKind::SubmitVerificationFailed => "submit_verification_failed",
            ErrorKind::SubmitTimeout => "submit_timeout",
            ErrorKind::TransformLossy => "transform_lossy",
            ErrorKind::SpoolQueued => "spool_queued",
            ErrorKind::IdempotentDuplicate => "idempotent_duplicate",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::IntegrityOrphan => "integrity_orphan",
            ErrorKind::OwnerLeaseExpired => "owner_lease_expired",
            ErrorKind::CapacityReached => "capacity_reached",
            ErrorKind::SlotUnavailable => "slot_unavailable",
            ErrorKind::ChildCrashed => "child_crashed",
            ErrorKind::ChildTimedOut => "child_timed_out",
            ErrorKind::OrphanOnSync => "orphan_on_sync",
            ErrorKind::OwnerBindingViolation => "owner_binding_violation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
