// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role routing table: who is connected, and what a name resolves to.
//!
//! Per-target polymorphism is replaced by a small finite variant set
//! resolved here; downstream code operates on resolved roles and pane ids
//! only.

use std::collections::HashMap;

use parking_lot::Mutex;

use troupe_core::{Role, Target};

/// What a registered client name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registrant {
    Role(Role),
    /// `<parentRole>-bg-<slot>` alias of a background worker.
    BackgroundAlias { alias: String, parent: Role },
}

/// Parse a registrant name: concrete role or background alias.
pub fn parse_registrant(name: &str) -> Option<Registrant> {
    if let Ok(role) = name.parse::<Role>() {
        return Some(Registrant::Role(role));
    }
    // `builder-bg-0` → parent builder.
    let (parent, rest) = name.split_once("-bg-")?;
    rest.parse::<u8>().ok()?;
    let parent = parent.parse::<Role>().ok()?;
    Some(Registrant::BackgroundAlias { alias: name.to_string(), parent })
}

/// Registry of connected registrants, keyed by their announced name.
#[derive(Default)]
pub struct RoleRoutes {
    connected: Mutex<HashMap<String, Registrant>>,
}

impl RoleRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, registrant: Registrant) {
        self.connected.lock().insert(name.to_string(), registrant);
    }

    pub fn unregister(&self, name: &str) {
        self.connected.lock().remove(name);
    }

    pub fn connected_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connected.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_connected_role(&self, role: Role) -> bool {
        self.connected
            .lock()
            .values()
            .any(|r| matches!(r, Registrant::Role(connected) if *connected == role))
    }

    /// Resolve a target string to a delivery [`Target`].
    pub fn resolve_target(&self, name: &str) -> Option<Target> {
        name.parse::<Target>().ok()
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
