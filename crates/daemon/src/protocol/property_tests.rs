// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;
use troupe_core::PaneId;

fn arb_mode() -> impl Strategy<Value = WriteMode> {
    prop_oneof![
        Just(WriteMode::Interactive),
        Just(WriteMode::Raw),
        Just(WriteMode::Chunked),
    ]
}

proptest! {
    #[test]
    fn write_requests_roundtrip(
        id in any::<u64>(),
        pane in 0u32..200,
        data in "[ -~]{0,256}",
        mode in arb_mode(),
        window in proptest::option::of(1usize..4096),
    ) {
        let frame = RequestFrame {
            id,
            request: Request::Write { pane_id: PaneId(pane), data: data.clone(), mode, window },
        };
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: RequestFrame = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, frame);
    }

    #[test]
    fn write_acks_roundtrip(id in any::<u64>(), acked in any::<usize>()) {
        let statuses = [
            WriteStatus::Accepted,
            WriteStatus::RejectedTerminalMissing,
            WriteStatus::RejectedNotAlive,
            WriteStatus::RejectedModeNoninteractive,
            WriteStatus::BlockedGhostDedup,
            WriteStatus::Error,
        ];
        for status in statuses {
            let frame = ResponseFrame {
                id,
                response: Response::WriteAck { status, acked_bytes: acked },
            };
            let json = serde_json::to_string(&frame).unwrap();
            let parsed: ResponseFrame = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, frame);
        }
    }

    #[test]
    fn frames_are_single_line(data in "[ -~]{0,512}") {
        // Newline framing requires that encoded frames never contain raw
        // newlines; serde_json escapes them.
        let frame = RequestFrame {
            id: 1,
            request: Request::Write {
                pane_id: PaneId(1),
                data,
                mode: WriteMode::Raw,
                window: None,
            },
        };
        let json = serde_json::to_string(&frame).unwrap();
        prop_assert!(!json.contains('\n'));
    }
}
