// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use troupe_core::PaneId;

#[test]
fn response_serializes_with_result_tag() {
    let frame = ResponseFrame {
        id: 3,
        response: Response::Spawned { pane_id: PaneId(1), pid: 4242 },
    };
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["id"], 3);
    assert_eq!(json["result"], "spawned");
    assert_eq!(json["pid"], 4242);
}

#[test]
fn write_ack_roundtrip() {
    let response = Response::WriteAck { status: WriteStatus::BlockedGhostDedup, acked_bytes: 0 };
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("blocked_ghost_dedup"));
    let parsed: Response = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, response);
}

#[test]
fn write_status_accepted_helper() {
    assert!(WriteStatus::Accepted.is_accepted());
    assert!(!WriteStatus::RejectedNotAlive.is_accepted());
}

#[test]
fn event_frames_tag_by_channel() {
    let event = EventFrame(DaemonEvent::PtyData {
        pane_id: PaneId(2),
        byte_len: 17,
        meaningful: true,
        bytes: None,
        at_ms: 99,
    });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["channel"], "pty_data");
    assert_eq!(json["byte_len"], 17);
    // Raw bytes omitted unless requested.
    assert!(json.get("bytes").is_none());
}

#[test]
fn meta_dropped_summary_roundtrip() {
    let event = EventFrame(DaemonEvent::Meta { dropped: 12 });
    let json = serde_json::to_string(&event).unwrap();
    let parsed: EventFrame = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn error_constructor() {
    let response = Response::error("exec_failed", "no such file");
    match response {
        Response::Error { kind, message } => {
            assert_eq!(kind, "exec_failed");
            assert_eq!(message, "no such file");
        }
        other => panic!("unexpected: {other:?}"),
    }
}
