// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn background_pane_ids_are_synthetic_and_stable() {
    let id = PaneId::background(PaneId(1), 2);
    assert_eq!(id, PaneId(112));
    assert!(id.is_background());
    assert!(!PaneId(2).is_background());
}

#[test]
fn background_slots_do_not_collide_across_parents() {
    let mut seen = std::collections::HashSet::new();
    for parent in 0..3u32 {
        for slot in 0..3u8 {
            assert!(seen.insert(PaneId::background(PaneId(parent), slot)));
        }
    }
}

#[test]
fn alive_states() {
    assert!(PaneState::Starting.is_alive());
    assert!(PaneState::Alive.is_alive());
    assert!(PaneState::Stuck.is_alive());
    assert!(!PaneState::Dead.is_alive());
}

#[test]
fn pane_spec_serde_defaults() {
    let json = r#"{"pane_id":1,"role":"builder","command":["agent"]}"#;
    let spec: PaneSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(spec.geometry, PaneGeometry::default());
    assert_eq!(spec.scrollback_bytes, 256 * 1024);
    assert!(spec.env.is_empty());
}
