// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI-specific submit quirks.
//!
//! Some wrapped CLIs mishandle multi-line paste or interpret leading
//! dashes as flags. Each role carries an ordered transform list; a
//! transform that alters content marks the result lossy, which emits a
//! warning contract violation for observability.

use serde::{Deserialize, Serialize};

/// One content transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Collapse newlines into `; ` so a multi-line body submits as one line.
    JoinLines,
    /// Prefix a leading dash with a space so it cannot parse as a flag.
    EscapeLeadingDash,
    /// Strip trailing whitespace per line.
    TrimTrailing,
}

/// Result of applying a transform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub text: String,
    pub lossy: bool,
    /// Which transforms actually changed content.
    pub applied: Vec<Transform>,
}

/// Apply transforms in order, tracking lossiness.
pub fn apply(transforms: &[Transform], input: &str) -> Transformed {
    let mut text = input.to_string();
    let mut applied = Vec::new();
    let mut lossy = false;

    for transform in transforms {
        let next = match transform {
            Transform::JoinLines => {
                if text.contains('\n') {
                    text.split('\n')
                        .map(str::trim_end)
                        .filter(|l| !l.is_empty())
                        .collect::<Vec<_>>()
                        .join("; ")
                } else {
                    text.clone()
                }
            }
            Transform::EscapeLeadingDash => {
                if text.starts_with('-') {
                    format!(" {text}")
                } else {
                    text.clone()
                }
            }
            Transform::TrimTrailing => text
                .split('\n')
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n"),
        };
        if next != text {
            applied.push(*transform);
            // Joining lines and escaping change content; trimming trailing
            // whitespace is cosmetic.
            lossy |= !matches!(transform, Transform::TrimTrailing);
            text = next;
        }
    }

    Transformed { text, lossy, applied }
}

/// Default transform chain for interactive CLI targets.
pub fn default_chain() -> Vec<Transform> {
    vec![Transform::TrimTrailing, Transform::JoinLines, Transform::EscapeLeadingDash]
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
