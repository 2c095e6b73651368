//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`WARDEN_*` prefix, `__` between nesting levels)
//! 2. warden.local.toml (gitignored, local overrides)
//! 3. warden.toml (git-tracked, project config)
//! 4. ~/.config/warden/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! ```toml
//! [engine]
//! resolve_timeout_ms = 250
//! audit_logging = true
//!
//! [policy]
//! rule_set = "policy/rules.toml"
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Warden configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub engine: EngineSettings,
    pub policy: PolicySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Upper bound on attribute lookups per evaluation, in milliseconds.
    pub resolve_timeout_ms: u64,
    pub audit_logging: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            resolve_timeout_ms: 250,
            audit_logging: true,
        }
    }
}

impl EngineSettings {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Rule-set document (TOML, or JSON with a `.json` extension).
    pub rule_set: PathBuf,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            rule_set: PathBuf::from("policy/rules.toml"),
        }
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file, without layering.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.resolve_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "engine.resolve_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.policy.rule_set.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "policy.rule_set must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.policy.rule_set.is_relative() {
            self.policy.rule_set = base.join(&self.policy.rule_set);
        }
    }
}
