// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and fixtures shared by other crates' tests.

use std::collections::HashMap;

use crate::claim::{Claim, ClaimId, ClaimStatus, ClaimType};
use crate::config::{ExperimentProfile, RoleConfig, TroupeConfig, VerificationConfig};
use crate::envelope::{MessageEnvelope, MessageId, PriorityTag, SessionId};
use crate::event::{EventKind, EventSource, LedgerEvent};
use crate::id::CorrelationId;
use crate::role::{Role, Target};

/// An envelope from coordinator to builder with the given body and sequence.
pub fn envelope(body: &str, sequence: u64) -> MessageEnvelope {
    MessageEnvelope {
        message_id: MessageId::new(),
        from_role: Role::Coordinator,
        target: Target::Role(Role::Builder),
        body: body.to_string(),
        priority: PriorityTag::Task,
        sequence_number: sequence,
        sender_session: SessionId::from("ssn-test"),
        created_at_ms: 1_000,
    }
}

/// A minimal ledger event of the given kind.
pub fn event(kind: EventKind, correlation: &CorrelationId) -> LedgerEvent {
    LedgerEvent::new(kind, EventSource::Delivery, *correlation).at(1_000)
}

/// A proposed fact claim owned by the builder.
pub fn claim(statement: &str, key: &str) -> Claim {
    Claim {
        claim_id: ClaimId::new(),
        idempotency_key: key.to_string(),
        statement: statement.to_string(),
        claim_type: ClaimType::Fact,
        owner_role: Role::Builder,
        confidence: 0.8,
        status: ClaimStatus::Proposed,
        supersedes: None,
        session: SessionId::from("ssn-test"),
        ttl_hours: None,
        created_at_ms: 1_000,
        updated_at_ms: 1_000,
    }
}

/// A config with the default fleet and one `test-suite` experiment profile.
pub fn config() -> TroupeConfig {
    let mut roles = HashMap::new();
    for name in ["coordinator", "builder", "oracle"] {
        roles.insert(
            name.to_string(),
            RoleConfig {
                command: vec!["agent-cli".to_string()],
                env: HashMap::new(),
                verification: VerificationConfig::default(),
            },
        );
    }
    let mut experiments = HashMap::new();
    experiments.insert(
        "test-suite".to_string(),
        ExperimentProfile {
            command: vec!["cargo".to_string(), "test".to_string(), "-p".to_string(), "{path}".to_string()],
            allowed_params: vec!["path".to_string()],
            timeout_ms: 60_000,
        },
    );
    TroupeConfig { roles, delivery: Default::default(), experiments, aliases: HashMap::new() }
}
