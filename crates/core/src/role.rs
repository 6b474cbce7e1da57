// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roles and delivery targets.
//!
//! A [`Role`] names one concrete agent; a [`Target`] is what senders address
//! (a role or a group alias). Group aliases are expanded at the broker
//! boundary; downstream code operates on resolved roles and pane ids only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pane::PaneId;

/// One concrete agent in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Builder,
    Oracle,
    /// Ephemeral background worker owned by a parent pane.
    Background {
        parent: PaneId,
        slot: u8,
    },
}

impl Role {
    /// Default pane assignment for the fixed fleet.
    pub fn default_pane(&self) -> Option<PaneId> {
        match self {
            Role::Coordinator => Some(PaneId(0)),
            Role::Builder => Some(PaneId(1)),
            Role::Oracle => Some(PaneId(2)),
            Role::Background { parent, slot } => Some(PaneId::background(*parent, *slot)),
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, Role::Background { .. })
    }

    /// The stable slot id form `bg-<parentPaneId>-<slotIndex>`.
    pub fn slot_id(&self) -> Option<String> {
        match self {
            Role::Background { parent, slot } => Some(format!("bg-{}-{}", parent.0, slot)),
            _ => None,
        }
    }

    /// Human alias for a background worker: `<parentRole>-bg-<slot>`.
    pub fn background_alias(&self, parent_role: Role) -> Option<String> {
        match self {
            Role::Background { slot, .. } => Some(format!("{}-bg-{}", parent_role, slot)),
            _ => None,
        }
    }

    /// Uppercase short tag used in the printed message prefix `(ROLE #N): `.
    pub fn prefix_tag(&self) -> String {
        match self {
            Role::Coordinator => "COORD".to_string(),
            Role::Builder => "BUILDER".to_string(),
            Role::Oracle => "ORACLE".to_string(),
            Role::Background { parent, slot } => format!("BG-{}-{}", parent.0, slot),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Builder => write!(f, "builder"),
            Role::Oracle => write!(f, "oracle"),
            Role::Background { parent, slot } => write!(f, "bg-{}-{}", parent.0, slot),
        }
    }
}

/// Error for unparseable role/target strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target: {0:?}")]
pub struct InvalidTarget(pub String);

impl FromStr for Role {
    type Err = InvalidTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept common shorthands; the memory alias table builds on this.
        match s.to_ascii_lowercase().as_str() {
            "coordinator" | "coord" => Ok(Role::Coordinator),
            "builder" | "build" => Ok(Role::Builder),
            "oracle" => Ok(Role::Oracle),
            other => parse_background(other).ok_or_else(|| InvalidTarget(s.to_string())),
        }
    }
}

/// Parse `bg-<parent>-<slot>` into a background role.
fn parse_background(s: &str) -> Option<Role> {
    let rest = s.strip_prefix("bg-")?;
    let (parent, slot) = rest.split_once('-')?;
    Some(Role::Background {
        parent: PaneId(parent.parse().ok()?),
        slot: slot.parse().ok()?,
    })
}

/// What a sender addresses: a concrete role or a group alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Role(Role),
    /// Every fleet role except the sender.
    All,
    /// Builder and oracle (the non-coordinating peers).
    Workers,
}

impl Target {
    /// Expand a target into concrete roles, excluding the sender.
    pub fn resolve(&self, from: Role) -> Vec<Role> {
        let members: Vec<Role> = match self {
            Target::Role(role) => vec![*role],
            Target::All => vec![Role::Coordinator, Role::Builder, Role::Oracle],
            Target::Workers => vec![Role::Builder, Role::Oracle],
        };
        members.into_iter().filter(|r| *r != from).collect()
    }

    pub fn as_role(&self) -> Option<Role> {
        match self {
            Target::Role(role) => Some(*role),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Role(role) => write!(f, "{}", role),
            Target::All => write!(f, "all"),
            Target::Workers => write!(f, "workers"),
        }
    }
}

impl FromStr for Target {
    type Err = InvalidTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Target::All),
            "workers" => Ok(Target::Workers),
            _ => s.parse::<Role>().map(Target::Role),
        }
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
