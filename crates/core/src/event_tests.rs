// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn kind_roundtrips_through_dotted_string() {
    let kinds = [
        EventKind::InjectRequested,
        EventKind::InjectSubmitSent,
        EventKind::DaemonWriteAck,
        EventKind::VerifyPass,
        EventKind::VerifyFalsePositive,
        EventKind::ExperimentCompleted,
        EventKind::CompactionEnded,
    ];
    for kind in kinds {
        let json = serde_json::to_string(&kind).unwrap();
        let parsed: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kind);
    }
}

#[test]
fn unknown_kind_is_preserved() {
    let parsed: EventKind = serde_json::from_str("\"future.kind\"").unwrap();
    assert_eq!(parsed, EventKind::Other("future.kind".to_string()));
    assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"future.kind\"");
}

#[test]
fn verify_pass_serializes_as_expected_literal() {
    assert_eq!(serde_json::to_string(&EventKind::VerifyPass).unwrap(), "\"verify.pass\"");
    assert_eq!(
        serde_json::to_string(&EventKind::InjectSubmitSent).unwrap(),
        "\"inject.submit.sent\""
    );
}

#[test]
fn builder_sets_envelope_fields() {
    let correlation = CorrelationId::new();
    let parent = Uuid::new_v4();
    let event = LedgerEvent::new(EventKind::InjectRequested, EventSource::Delivery, correlation)
        .with_pane(PaneId(1))
        .with_cause(parent)
        .with_payload(serde_json::json!({"bytes": 42}))
        .at(123);

    assert_eq!(event.correlation_id, correlation);
    assert_eq!(event.causation_id, Some(parent));
    assert_eq!(event.pane_id, Some(PaneId(1)));
    assert_eq!(event.timestamp_ms, 123);
    assert_eq!(event.payload["bytes"], 42);
}

#[test]
fn envelope_serde_roundtrip() {
    let correlation = CorrelationId::new();
    let event = LedgerEvent::new(EventKind::PtyUp, EventSource::Daemon, correlation)
        .with_pane(PaneId(0))
        .at(5);
    let json = serde_json::to_string(&event).unwrap();
    let parsed: LedgerEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn null_payload_is_omitted() {
    let event =
        LedgerEvent::new(EventKind::PtyUp, EventSource::Daemon, CorrelationId::new()).at(5);
    let json = serde_json::to_string(&event).unwrap();
    assert!(!json.contains("payload"));
    assert!(!json.contains("causation_id"));
}
