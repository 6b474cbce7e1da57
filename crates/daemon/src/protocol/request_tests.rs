// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use troupe_core::PaneId;

#[test]
fn spawn_serializes_with_op_tag() {
    let frame = RequestFrame {
        id: 7,
        request: Request::Spawn {
            pane_id: PaneId(1),
            role: Role::Builder,
            command: vec!["agent-cli".to_string()],
            env: HashMap::new(),
            geometry: PaneGeometry::default(),
            scrollback_bytes: None,
            restart_on_dead: false,
        },
    };
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["id"], 7);
    assert_eq!(json["op"], "spawn");
    assert_eq!(json["pane_id"], 1);
}

#[test]
fn write_defaults_are_optional_on_the_wire() {
    let json = r#"{"id":1,"op":"write","pane_id":2,"data":"hello"}"#;
    let frame: RequestFrame = serde_json::from_str(json).unwrap();
    match frame.request {
        Request::Write { pane_id, data, mode, window } => {
            assert_eq!(pane_id, PaneId(2));
            assert_eq!(data, "hello");
            assert_eq!(mode, WriteMode::Interactive);
            assert!(window.is_none());
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn roundtrip_all_request_shapes() {
    let requests = vec![
        Request::Ping,
        Request::Write {
            pane_id: PaneId(1),
            data: "x".to_string(),
            mode: WriteMode::Chunked,
            window: Some(512),
        },
        Request::Resize { pane_id: PaneId(1), cols: 80, rows: 24 },
        Request::Kill { pane_id: PaneId(1), signal: Some(15), reason: Some("restart".into()) },
        Request::SendTrustedEnter { pane_id: PaneId(0) },
        Request::Subscribe {
            channels: vec![SubscribeChannel::Data, SubscribeChannel::Health],
            raw: true,
        },
        Request::Status,
        Request::Shutdown,
    ];
    for request in requests {
        let frame = RequestFrame { id: 42, request: request.clone() };
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: RequestFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request, request);
        assert_eq!(parsed.id, 42);
    }
}
