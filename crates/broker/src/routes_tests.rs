// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_concrete_roles() {
    assert_eq!(parse_registrant("builder"), Some(Registrant::Role(Role::Builder)));
    assert_eq!(parse_registrant("coordinator"), Some(Registrant::Role(Role::Coordinator)));
}

#[test]
fn parses_background_aliases() {
    match parse_registrant("builder-bg-2") {
        Some(Registrant::BackgroundAlias { alias, parent }) => {
            assert_eq!(alias, "builder-bg-2");
            assert_eq!(parent, Role::Builder);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn rejects_unknown_names() {
    assert!(parse_registrant("intern").is_none());
    assert!(parse_registrant("builder-bg-x").is_none());
    assert!(parse_registrant("ghost-bg-0").is_none());
}

#[test]
fn registry_tracks_connections() {
    let routes = RoleRoutes::new();
    routes.register("builder", Registrant::Role(Role::Builder));
    routes.register("coordinator", Registrant::Role(Role::Coordinator));

    assert!(routes.is_connected_role(Role::Builder));
    assert!(!routes.is_connected_role(Role::Oracle));
    assert_eq!(routes.connected_names(), vec!["builder", "coordinator"]);

    routes.unregister("builder");
    assert!(!routes.is_connected_role(Role::Builder));
}

#[test]
fn resolve_target_handles_groups() {
    let routes = RoleRoutes::new();
    assert_eq!(routes.resolve_target("all"), Some(Target::All));
    assert_eq!(routes.resolve_target("workers"), Some(Target::Workers));
    assert_eq!(routes.resolve_target("oracle"), Some(Target::Role(Role::Oracle)));
    assert!(routes.resolve_target("nobody").is_none());
}
