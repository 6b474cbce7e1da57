// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use troupe_core::FakeClock;
use troupe_storage::{spawn_writer, EvidenceLedger};

use crate::host::testing::FakePaneHost;

struct Rig {
    manager: Arc<BackgroundManager<FakePaneHost, FakeClock>>,
    host: Arc<FakePaneHost>,
    clock: FakeClock,
    _dir: tempfile::TempDir,
}

fn rig() -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let ledger = EvidenceLedger::open(&dir.path().join("runtime")).unwrap();
    let (handle, _reader, _task) =
        spawn_writer(ledger, &dir.path().join("runtime/evidence-spool.log"));
    let host = Arc::new(FakePaneHost::new());
    let clock = FakeClock::new();
    let manager = BackgroundManager::new(
        Arc::clone(&host),
        handle,
        clock.clone(),
        troupe_core::PaneId(1),
        Role::Builder,
        vec!["agent-cli".to_string()],
    );
    Rig { manager, host, clock, _dir: dir }
}

#[tokio::test]
async fn three_spawns_fill_the_slots_fourth_hits_capacity() {
    let rig = rig();

    let mut aliases = Vec::new();
    for i in 0..3 {
        let info = rig
            .manager
            .spawn(Role::Builder, None, &format!("task {i}"))
            .await
            .unwrap();
        aliases.push(info.alias);
    }
    assert_eq!(aliases, vec!["builder-bg-0", "builder-bg-1", "builder-bg-2"]);

    let err = rig.manager.spawn(Role::Builder, None, "one too many").await.unwrap_err();
    assert_eq!(err, BackgroundError::CapacityReached);
}

#[tokio::test]
async fn explicit_slot_conflict_is_slot_unavailable() {
    let rig = rig();
    rig.manager.spawn(Role::Builder, Some(1), "first").await.unwrap();

    let err = rig.manager.spawn(Role::Builder, Some(1), "second").await.unwrap_err();
    assert_eq!(err, BackgroundError::SlotUnavailable);

    let err = rig.manager.spawn(Role::Builder, Some(9), "bad slot").await.unwrap_err();
    assert_eq!(err, BackgroundError::SlotUnavailable);
}

#[tokio::test]
async fn non_parent_operations_are_rejected() {
    let rig = rig();
    let err = rig.manager.spawn(Role::Oracle, None, "not yours").await.unwrap_err();
    assert_eq!(err, BackgroundError::OwnerBindingViolation);
    assert_eq!(rig.manager.list(Role::Coordinator).unwrap_err(), BackgroundError::OwnerBindingViolation);
    assert_eq!(
        rig.manager.kill(Role::Oracle, "builder-bg-0", "nope").await.unwrap_err(),
        BackgroundError::OwnerBindingViolation
    );
}

#[tokio::test]
async fn worker_briefing_carries_task_and_sentinel_contract() {
    let rig = rig();
    rig.manager.spawn(Role::Builder, None, "summarize the diff").await.unwrap();

    let spawned = rig.host.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].pane_id, troupe_core::PaneId::background(troupe_core::PaneId(1), 0));
    assert_eq!(spawned[0].env.get(troupe_core::env::BG_ALIAS).unwrap(), "builder-bg-0");

    let writes = rig.host.writes();
    assert!(writes[0].data.contains("summarize the diff"));
    assert!(writes[0].data.contains(COMPLETION_SENTINEL));
}

#[tokio::test]
async fn sentinel_output_reaps_the_worker() {
    let rig = rig();
    let info = rig.manager.spawn(Role::Builder, None, "quick task").await.unwrap();
    assert_eq!(rig.manager.list(Role::Builder).unwrap().len(), 1);

    rig.manager
        .observe_output(info.pane_id, &format!("done!\n{COMPLETION_SENTINEL}\n"))
        .await;

    assert!(rig.manager.list(Role::Builder).unwrap().is_empty());
    assert_eq!(rig.host.killed().len(), 1);
    assert_eq!(rig.host.killed()[0].1, "completion_sentinel");
}

#[tokio::test]
async fn idle_ttl_reaps_quiet_workers() {
    let rig = rig();
    let info = rig.manager.spawn(Role::Builder, None, "slow task").await.unwrap();

    // Active output keeps it alive.
    rig.clock.advance(std::time::Duration::from_secs(19 * 60));
    rig.manager.observe_output(info.pane_id, "still working").await;
    rig.manager.reap_pass(true).await;
    assert_eq!(rig.manager.list(Role::Builder).unwrap().len(), 1);

    // Silence past the TTL reaps.
    rig.clock.advance(std::time::Duration::from_secs(21 * 60));
    rig.manager.reap_pass(true).await;
    assert!(rig.manager.list(Role::Builder).unwrap().is_empty());
}

#[tokio::test]
async fn parent_exit_reaps_everything() {
    let rig = rig();
    rig.manager.spawn(Role::Builder, None, "a").await.unwrap();
    rig.manager.spawn(Role::Builder, None, "b").await.unwrap();

    rig.manager.reap_pass(false).await;
    assert!(rig.manager.list(Role::Builder).unwrap().is_empty());
    assert_eq!(rig.host.killed().len(), 2);
}

#[tokio::test]
async fn kill_and_kill_all() {
    let rig = rig();
    rig.manager.spawn(Role::Builder, None, "a").await.unwrap();
    rig.manager.spawn(Role::Builder, None, "b").await.unwrap();

    rig.manager.kill(Role::Builder, "builder-bg-0", "done early").await.unwrap();
    assert_eq!(rig.manager.list(Role::Builder).unwrap().len(), 1);

    let reaped = rig.manager.kill_all(Role::Builder, "session rollover").await.unwrap();
    assert_eq!(reaped, 1);
    assert!(rig.manager.list(Role::Builder).unwrap().is_empty());
}

#[tokio::test]
async fn freed_slot_is_reusable() {
    let rig = rig();
    for _ in 0..3 {
        rig.manager.spawn(Role::Builder, None, "task").await.unwrap();
    }
    rig.manager.kill(Role::Builder, "builder-bg-1", "make room").await.unwrap();
    let info = rig.manager.spawn(Role::Builder, None, "replacement").await.unwrap();
    assert_eq!(info.slot, 1);
}

#[tokio::test]
async fn background_sender_may_only_address_its_parent() {
    let rig = rig();
    rig.manager.spawn(Role::Builder, None, "task").await.unwrap();

    assert!(rig.manager.check_send("builder-bg-0", Role::Builder).is_ok());
    assert_eq!(
        rig.manager.check_send("builder-bg-0", Role::Oracle).unwrap_err(),
        BackgroundError::OwnerBindingViolation
    );
    // Unknown aliases are not this manager's concern.
    assert!(rig.manager.check_send("someone-else", Role::Oracle).is_ok());
}

#[tokio::test]
async fn target_map_lists_aliases() {
    let rig = rig();
    rig.manager.spawn(Role::Builder, None, "task").await.unwrap();
    let map = rig.manager.target_map(Role::Builder).unwrap();
    assert_eq!(
        map.get("builder-bg-0"),
        Some(&troupe_core::PaneId::background(troupe_core::PaneId(1), 0))
    );
}
