// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn register_roundtrip() {
    let json = r#"{"type":"register","device_id":"dev-1","role":"builder","secret":"s3cret"}"#;
    let parsed: BrokerRequest = serde_json::from_str(json).unwrap();
    assert_eq!(
        parsed,
        BrokerRequest::Register {
            device_id: "dev-1".to_string(),
            role: "builder".to_string(),
            secret: "s3cret".to_string(),
        }
    );
}

#[test]
fn send_defaults() {
    let json = r#"{"type":"send","from_role":"coordinator","target_role":"builder","body":"hi","sequence":1}"#;
    let parsed: BrokerRequest = serde_json::from_str(json).unwrap();
    match parsed {
        BrokerRequest::Send { message_id, priority, metadata, .. } => {
            assert!(message_id.is_none());
            assert_eq!(priority, PriorityTag::Fyi);
            assert!(metadata.is_empty());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn ack_serializes_delivery_taxonomy() {
    let ack = BrokerResponse::Ack {
        message_id: MessageId::from("msg-1"),
        outcome: "delivered.verified".to_string(),
        reason: None,
    };
    let json = serde_json::to_value(&ack).unwrap();
    assert_eq!(json["type"], "ack");
    assert_eq!(json["outcome"], "delivered.verified");
    assert!(json.get("reason").is_none());
}

#[test]
fn background_action_names_are_camel_case() {
    assert_eq!(serde_json::to_string(&BackgroundAction::KillAll).unwrap(), "\"killAll\"");
    assert_eq!(serde_json::to_string(&BackgroundAction::TargetMap).unwrap(), "\"targetMap\"");
}

#[test]
fn health_status_roundtrip() {
    for status in [
        HealthStatus::Healthy,
        HealthStatus::Stale,
        HealthStatus::NoRoute,
        HealthStatus::InvalidTarget,
    ] {
        let json = serde_json::to_string(&status).unwrap();
        let parsed: HealthStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
    assert_eq!(serde_json::to_string(&HealthStatus::NoRoute).unwrap(), "\"noRoute\"");
}
