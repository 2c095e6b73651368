//! Main entry point for embedding Warden.
//!
//! `Warden` wires a [`WardenConfig`] to a [`DecisionEngine`]: it builds the
//! engine, loads the configured rule-set file and re-reads it on request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use warden_abac::{
    AttributeStore, Decision, DecisionEngine, EngineConfig, PolicyError, PredicateRegistry,
    Request, RuleSet,
};
use warden_config::WardenConfig;

/// An access decision point backed by a rule-set file.
pub struct Warden {
    engine: DecisionEngine,
    rule_set_path: PathBuf,
}

impl Warden {
    /// Opens a decision point with the builtin predicate library.
    pub fn open(config: &WardenConfig, store: Arc<dyn AttributeStore>) -> Result<Self> {
        Self::open_with_registry(config, store, PredicateRegistry::builtin())
    }

    /// Opens a decision point with a caller-supplied predicate registry.
    ///
    /// Fails if the configuration is invalid or the rule-set file cannot be
    /// read, parsed or compiled.
    pub fn open_with_registry(
        config: &WardenConfig,
        store: Arc<dyn AttributeStore>,
        registry: PredicateRegistry,
    ) -> Result<Self> {
        config.validate().context("Invalid Warden configuration")?;

        let engine_config = EngineConfig::default()
            .with_resolve_timeout(config.engine.resolve_timeout())
            .with_audit_logging(config.engine.audit_logging);
        let engine = DecisionEngine::new(store, registry).with_config(engine_config);

        let warden = Self {
            engine,
            rule_set_path: config.policy.rule_set.clone(),
        };
        let version = warden.reload()?;

        tracing::info!(
            path = %warden.rule_set_path.display(),
            version,
            "Warden opened"
        );
        Ok(warden)
    }

    /// Evaluates an access request against the active rule set.
    pub fn evaluate(&self, request: &Request) -> Decision {
        self.engine.evaluate(request)
    }

    /// Re-reads the rule-set file and swaps it in.
    ///
    /// On any error the active rule set stays in place.
    pub fn reload(&self) -> Result<u64> {
        let rule_set = read_rule_set(&self.rule_set_path)?;
        let version = self
            .engine
            .load_rule_set(&rule_set)
            .with_context(|| format!("Rejected rule set at {}", self.rule_set_path.display()))?;
        Ok(version)
    }

    /// Replaces the active rule set with one built in code.
    pub fn load_rule_set(&self, rule_set: &RuleSet) -> Result<u64, PolicyError> {
        self.engine.load_rule_set(rule_set)
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn rule_set_path(&self) -> &Path {
        &self.rule_set_path
    }
}

/// Reads a rule-set document. Files ending in `.json` are parsed as JSON,
/// everything else as TOML.
pub fn read_rule_set(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule set at {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rule_set = if is_json {
        RuleSet::from_json_str(&document)
    } else {
        RuleSet::from_toml_str(&document)
    };

    rule_set.with_context(|| format!("Failed to parse rule set at {}", path.display()))
}
