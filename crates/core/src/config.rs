// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace configuration: pane command templates, per-role verification
//! calibration, delivery tuning, and experiment profiles.
//!
//! Reads take an immutable snapshot (`Arc<TroupeConfig>`); reload swaps the
//! pointer so in-flight operations keep their snapshot. Writes go through
//! write-temp-then-rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config encode failed: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("experiment profile {0:?} not found")]
    UnknownProfile(String),

    #[error("parameter {param:?} not allowed for profile {profile:?}")]
    ParamNotAllowed { profile: String, param: String },
}

/// Per-role verification calibration (the "weak evidence" signal sets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_accepted_signals")]
    pub accepted_signals: Vec<String>,
    #[serde(default = "default_disallowed_signals")]
    pub disallowed_signals: Vec<String>,
    /// Whether a weak-evidence-only verification may close as a risked pass.
    #[serde(default)]
    pub allow_weak: bool,
}

fn default_accepted_signals() -> Vec<String> {
    vec!["meaningful_output".to_string(), "prompt_redraw".to_string()]
}

fn default_disallowed_signals() -> Vec<String> {
    vec!["compaction_output".to_string()]
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            accepted_signals: default_accepted_signals(),
            disallowed_signals: default_disallowed_signals(),
            allow_weak: false,
        }
    }
}

/// One pane role's command template and environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Argv template; `{workspace}` expands to the workspace root.
    pub command: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Delivery engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_verify_budget_ms")]
    pub verify_budget_ms: u64,
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_defer_queue_cap")]
    pub defer_queue_cap: usize,
    #[serde(default = "default_defer_ttl_ms")]
    pub defer_ttl_ms: u64,
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
}

fn default_verify_budget_ms() -> u64 {
    5_000
}
fn default_retry_initial_ms() -> u64 {
    300
}
fn default_retry_max_attempts() -> u32 {
    2
}
fn default_defer_queue_cap() -> usize {
    8
}
fn default_defer_ttl_ms() -> u64 {
    30_000
}
fn default_dedup_window_ms() -> u64 {
    30_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            verify_budget_ms: default_verify_budget_ms(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            defer_queue_cap: default_defer_queue_cap(),
            defer_ttl_ms: default_defer_ttl_ms(),
            dedup_window_ms: default_dedup_window_ms(),
        }
    }
}

/// A registered experiment profile. Experiments never run free-form shell;
/// they run a named profile with placeholder parameters checked against the
/// allowlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentProfile {
    /// Argv template; `{param}` placeholders are substituted after
    /// allowlist validation.
    pub command: Vec<String>,
    /// Parameters callers may supply.
    #[serde(default)]
    pub allowed_params: Vec<String>,
    #[serde(default = "default_experiment_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_experiment_timeout_ms() -> u64 {
    120_000
}

impl ExperimentProfile {
    /// Validate args against the allowlist and render the argv.
    pub fn render(
        &self,
        profile_name: &str,
        args: &HashMap<String, String>,
    ) -> Result<Vec<String>, ConfigError> {
        for param in args.keys() {
            if !self.allowed_params.iter().any(|p| p == param) {
                return Err(ConfigError::ParamNotAllowed {
                    profile: profile_name.to_string(),
                    param: param.clone(),
                });
            }
        }
        let rendered = self
            .command
            .iter()
            .map(|part| {
                let mut out = part.clone();
                for (key, value) in args {
                    out = out.replace(&format!("{{{key}}}"), value);
                }
                out
            })
            .collect();
        Ok(rendered)
    }
}

/// Root configuration document (`.troupe/config.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TroupeConfig {
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub experiments: HashMap<String, ExperimentProfile>,
    /// Agent identifier aliases, e.g. `coord = "coordinator"`.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl TroupeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Atomic write: temp file in the same directory, then rename.
    pub fn store(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Result<&ExperimentProfile, ConfigError> {
        self.experiments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

/// Swappable configuration handle. In-flight operations keep the snapshot
/// they started with.
#[derive(Clone)]
pub struct ConfigHandle {
    path: PathBuf,
    current: Arc<RwLock<Arc<TroupeConfig>>>,
}

impl ConfigHandle {
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            TroupeConfig::load(&path)?
        } else {
            TroupeConfig::default()
        };
        Ok(Self { path, current: Arc::new(RwLock::new(Arc::new(config))) })
    }

    pub fn snapshot(&self) -> Arc<TroupeConfig> {
        Arc::clone(&self.current.read())
    }

    /// Re-read from disk and swap the snapshot.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let fresh = TroupeConfig::load(&self.path)?;
        *self.current.write() = Arc::new(fresh);
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
