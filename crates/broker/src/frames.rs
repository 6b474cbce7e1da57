// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker websocket frames. JSON, tagged by `type`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use troupe_core::{MessageId, PriorityTag};

/// Background-agent actions (coordinator role only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundAction {
    Spawn,
    List,
    Kill,
    KillAll,
    TargetMap,
}

/// Client → broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BrokerRequest {
    Register {
        device_id: String,
        /// Role name or background alias (`builder-bg-0`).
        role: String,
        secret: String,
    },

    Send {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        from_role: String,
        target_role: String,
        body: String,
        sequence: u64,
        #[serde(default)]
        priority: PriorityTag,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, String>,
    },

    HealthCheck {
        target: String,
    },

    BackgroundAgent {
        action: BackgroundAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Health of a route target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Healthy,
    Stale,
    NoRoute,
    InvalidTarget,
}

/// Broker → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BrokerResponse {
    RegisterAck {
        ok: bool,
        role: String,
        connected_roles: Vec<String>,
    },

    Ack {
        message_id: MessageId,
        /// Delivery taxonomy string (`delivered.verified`, ...).
        outcome: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Health {
        status: HealthStatus,
    },

    BackgroundAck {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        workers: Vec<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        target_map: HashMap<String, u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    Error {
        kind: String,
        message: String,
    },
}

impl BrokerResponse {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        BrokerResponse::Error { kind: kind.to_string(), message: message.into() }
    }
}

#[cfg(test)]
#[path = "frames_tests.rs"]
mod tests;
