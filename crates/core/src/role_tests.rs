// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    coordinator = { "coordinator", Role::Coordinator },
    coord_short = { "coord", Role::Coordinator },
    builder = { "builder", Role::Builder },
    oracle = { "ORACLE", Role::Oracle },
)]
fn parse_role(input: &str, expected: Role) {
    assert_eq!(input.parse::<Role>().unwrap(), expected);
}

#[test]
fn parse_background_role() {
    let role: Role = "bg-1-2".parse().unwrap();
    assert_eq!(role, Role::Background { parent: PaneId(1), slot: 2 });
    assert_eq!(role.slot_id().unwrap(), "bg-1-2");
}

#[test]
fn unknown_role_is_rejected() {
    assert!("intern".parse::<Role>().is_err());
    assert!("bg-x-1".parse::<Role>().is_err());
}

#[test]
fn display_roundtrip() {
    for role in [Role::Coordinator, Role::Builder, Role::Oracle] {
        let parsed: Role = role.to_string().parse().unwrap();
        assert_eq!(parsed, role);
    }
}

#[test]
fn background_alias_includes_parent_role() {
    let role = Role::Background { parent: PaneId(1), slot: 0 };
    assert_eq!(role.background_alias(Role::Builder).unwrap(), "builder-bg-0");
}

#[test]
fn target_all_excludes_sender() {
    let roles = Target::All.resolve(Role::Coordinator);
    assert_eq!(roles, vec![Role::Builder, Role::Oracle]);
}

#[test]
fn target_workers_excludes_sender() {
    let roles = Target::Workers.resolve(Role::Builder);
    assert_eq!(roles, vec![Role::Oracle]);
}

#[test]
fn target_role_resolves_to_itself() {
    let roles = Target::Role(Role::Oracle).resolve(Role::Coordinator);
    assert_eq!(roles, vec![Role::Oracle]);
}

#[test]
fn target_parse_groups() {
    assert_eq!("all".parse::<Target>().unwrap(), Target::All);
    assert_eq!("workers".parse::<Target>().unwrap(), Target::Workers);
    assert_eq!("builder".parse::<Target>().unwrap(), Target::Role(Role::Builder));
}

#[test]
fn default_pane_assignment() {
    assert_eq!(Role::Coordinator.default_pane(), Some(PaneId(0)));
    assert_eq!(Role::Builder.default_pane(), Some(PaneId(1)));
    assert_eq!(Role::Oracle.default_pane(), Some(PaneId(2)));
}

#[test]
fn prefix_tags() {
    assert_eq!(Role::Coordinator.prefix_tag(), "COORD");
    assert_eq!(Role::Background { parent: PaneId(1), slot: 2 }.prefix_tag(), "BG-1-2");
}
