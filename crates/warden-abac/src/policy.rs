//! ABAC policy definitions.
//!
//! A rule set is an ordered list of named rules; each rule is a conjunction
//! of predicate invocations. Rule sets are plain data (TOML or JSON) and are
//! compiled against a [`PredicateRegistry`] before the engine accepts them.
//! Compilation is where configuration errors surface: a rule set that
//! compiles can never fail at evaluation time for policy reasons.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attributes::AttributeKind;
use crate::predicate::{Predicate, PredicateArgs, PredicateRegistry, names};
use crate::request::WORKING_HOURS;

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors. A rule set producing any of these is rejected as a
/// whole and the previously loaded set stays active.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("rule '{rule}' references unregistered predicate '{predicate}'")]
    UnknownPredicate { rule: String, predicate: String },

    #[error("rule '{rule}' has no predicates")]
    EmptyRule { rule: String },

    #[error("rule at position {position} has an empty name")]
    UnnamedRule { position: usize },

    #[error("rule name '{rule}' is used more than once")]
    DuplicateRule { rule: String },

    #[error("rule '{rule}': invalid arguments for predicate '{predicate}': {message}")]
    InvalidArguments {
        rule: String,
        predicate: String,
        message: String,
    },

    #[error("predicate '{predicate}' is already registered")]
    DuplicatePredicate { predicate: String },

    #[error("failed to parse TOML rule set: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON rule set: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Rule
// ============================================================================

/// One predicate invocation inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateCall {
    /// Registered predicate name.
    pub predicate: String,
    #[serde(default, skip_serializing_if = "PredicateArgs::is_empty")]
    pub args: PredicateArgs,
}

impl PredicateCall {
    pub fn new(predicate: &str, args: impl Into<PredicateArgs>) -> Self {
        Self {
            predicate: predicate.to_string(),
            args: args.into(),
        }
    }
}

/// A single grantable access path.
///
/// Satisfied iff every predicate holds. Predicates run left to right and
/// evaluation stops at the first `false`, so cheap request-only checks should
/// come before checks that need attribute lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable name for audit logging. Unique within a rule set.
    pub name: String,
    pub predicates: Vec<PredicateCall>,
}

impl Rule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            predicates: Vec::new(),
        }
    }

    /// Appends a predicate invocation (builder pattern).
    pub fn with_predicate(mut self, predicate: &str, args: impl Into<PredicateArgs>) -> Self {
        self.predicates.push(PredicateCall::new(predicate, args));
        self
    }
}

// ============================================================================
// RuleSet
// ============================================================================

/// An ordered collection of rules forming one policy version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule to the end of the set (builder pattern).
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parses a rule set from a TOML document with a `[[rules]]` array.
    pub fn from_toml_str(document: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(document)?)
    }

    /// Parses a rule set from a JSON document `{"rules": [...]}`.
    pub fn from_json_str(document: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Checks the rule set against a registry and produces the form the
    /// engine evaluates.
    pub fn compile(&self, registry: &PredicateRegistry) -> Result<CompiledRuleSet, PolicyError> {
        let mut seen = HashSet::with_capacity(self.rules.len());
        let mut rules = Vec::with_capacity(self.rules.len());

        for (position, rule) in self.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(PolicyError::UnnamedRule { position });
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(PolicyError::DuplicateRule {
                    rule: rule.name.clone(),
                });
            }
            if rule.predicates.is_empty() {
                return Err(PolicyError::EmptyRule {
                    rule: rule.name.clone(),
                });
            }

            let mut predicates = Vec::with_capacity(rule.predicates.len());
            for call in &rule.predicates {
                let predicate =
                    registry
                        .get(&call.predicate)
                        .ok_or_else(|| PolicyError::UnknownPredicate {
                            rule: rule.name.clone(),
                            predicate: call.predicate.clone(),
                        })?;

                predicate
                    .check_args(&call.args)
                    .map_err(|message| PolicyError::InvalidArguments {
                        rule: rule.name.clone(),
                        predicate: call.predicate.clone(),
                        message,
                    })?;

                predicates.push(CompiledPredicate {
                    name: call.predicate.clone(),
                    args: call.args.clone(),
                    predicate,
                });
            }

            rules.push(CompiledRule {
                name: rule.name.clone(),
                predicates,
            });
        }

        Ok(CompiledRuleSet { rules })
    }

    /// Returns the smart-building policy.
    ///
    /// Rules:
    /// 1. Employees may open smart locks during working hours
    /// 2. Visitors may open smart locks during working hours from the device
    ///    paired with the lock
    /// 3. Employees may adjust thermostats at their assigned location
    ///
    /// Visitors have no thermostat rule; default deny covers them.
    pub fn smart_building_policy() -> Self {
        Self::new()
            .with_rule(
                Rule::new("employee-lock-rule")
                    .with_predicate(names::DEVICE_TYPE_IS, [("device_type", "Smart_Lock")])
                    .with_predicate(names::TIME_WINDOW_VALID, [("window", WORKING_HOURS)])
                    .with_predicate(names::ROLE_IS, [("role", "Employee")]),
            )
            .with_rule(
                Rule::new("visitor-lock-rule")
                    .with_predicate(names::DEVICE_TYPE_IS, [("device_type", "Smart_Lock")])
                    .with_predicate(names::TIME_WINDOW_VALID, [("window", WORKING_HOURS)])
                    .with_predicate(names::ROLE_IS, [("role", "Visitor")])
                    .with_predicate(names::DEVICE_PAIRING_MATCHES, PredicateArgs::new()),
            )
            .with_rule(
                Rule::new("employee-thermostat-rule")
                    .with_predicate(names::DEVICE_TYPE_IS, [("device_type", "Thermostat")])
                    .with_predicate(names::ROLE_IS, [("role", "Employee")])
                    .with_predicate(names::LOCATION_MATCHES, PredicateArgs::new()),
            )
    }
}

// ============================================================================
// Compiled form
// ============================================================================

/// A predicate invocation bound to its implementation.
#[derive(Clone)]
pub(crate) struct CompiledPredicate {
    pub(crate) name: String,
    pub(crate) args: PredicateArgs,
    pub(crate) predicate: Arc<dyn Predicate>,
}

impl CompiledPredicate {
    pub(crate) fn requires(&self) -> &[AttributeKind] {
        self.predicate.requires()
    }
}

#[derive(Clone)]
pub(crate) struct CompiledRule {
    pub(crate) name: String,
    pub(crate) predicates: Vec<CompiledPredicate>,
}

/// A rule set that passed validation against a predicate registry.
#[derive(Clone, Default)]
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    pub(crate) fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }
}

impl std::fmt::Debug for CompiledRuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRuleSet")
            .field("rules", &self.rule_names())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PredicateRegistry {
        PredicateRegistry::builtin()
    }

    #[test]
    fn test_smart_building_policy_structure() {
        let policy = RuleSet::smart_building_policy();
        assert_eq!(policy.len(), 3);
        assert_eq!(policy.rules[0].name, "employee-lock-rule");
        assert_eq!(policy.rules[1].name, "visitor-lock-rule");
        assert_eq!(policy.rules[2].name, "employee-thermostat-rule");

        // Request-only checks come first in every rule
        for rule in &policy.rules {
            assert_eq!(rule.predicates[0].predicate, names::DEVICE_TYPE_IS);
        }

        let compiled = policy.compile(&registry()).expect("builtin policy compiles");
        assert_eq!(
            compiled.rule_names(),
            vec![
                "employee-lock-rule",
                "visitor-lock-rule",
                "employee-thermostat-rule"
            ]
        );
    }

    #[test]
    fn test_unknown_predicate_rejected() {
        let policy = RuleSet::new().with_rule(
            Rule::new("mystery").with_predicate("is_full_moon", PredicateArgs::new()),
        );
        let err = policy.compile(&registry()).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnknownPredicate { ref rule, ref predicate }
                if rule == "mystery" && predicate == "is_full_moon"
        ));
    }

    #[test]
    fn test_empty_rule_rejected() {
        let policy = RuleSet::new().with_rule(Rule::new("allow-everything"));
        assert!(matches!(
            policy.compile(&registry()),
            Err(PolicyError::EmptyRule { .. })
        ));
    }

    #[test]
    fn test_unnamed_and_duplicate_rules_rejected() {
        let rule = Rule::new("a").with_predicate(names::LOCATION_MATCHES, PredicateArgs::new());

        let unnamed = RuleSet::new().with_rule(rule.clone()).with_rule(Rule {
            name: "  ".to_string(),
            ..rule.clone()
        });
        assert!(matches!(
            unnamed.compile(&registry()),
            Err(PolicyError::UnnamedRule { position: 1 })
        ));

        let duplicate = RuleSet::new().with_rule(rule.clone()).with_rule(rule);
        assert!(matches!(
            duplicate.compile(&registry()),
            Err(PolicyError::DuplicateRule { .. })
        ));
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let policy = RuleSet::new().with_rule(
            Rule::new("no-window").with_predicate(names::TIME_WINDOW_VALID, PredicateArgs::new()),
        );
        let err = policy.compile(&registry()).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArguments { .. }));
        assert!(err.to_string().contains("window"));
    }

    #[test]
    fn test_empty_rule_set_compiles() {
        let compiled = RuleSet::new().compile(&registry()).unwrap();
        assert!(compiled.is_empty());
    }

    #[test]
    fn test_from_toml_str() {
        let document = r#"
[[rules]]
name = "employee-lock-rule"
predicates = [
  { predicate = "device_type_is", args = { device_type = "Smart_Lock" } },
  { predicate = "time_window_valid", args = { window = "working_hours" } },
  { predicate = "role_is", args = { role = "Employee" } },
]

[[rules]]
name = "employee-thermostat-rule"
predicates = [
  { predicate = "device_type_is", args = { device_type = "Thermostat" } },
  { predicate = "role_is", args = { role = "Employee" } },
  { predicate = "location_matches" },
]
"#;
        let policy = RuleSet::from_toml_str(document).expect("parse TOML");
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.rules[0], RuleSet::smart_building_policy().rules[0]);
        assert_eq!(policy.rules[1], RuleSet::smart_building_policy().rules[2]);
    }

    #[test]
    fn test_from_json_str() {
        let json = serde_json::to_string(&RuleSet::smart_building_policy()).unwrap();
        let policy = RuleSet::from_json_str(&json).expect("parse JSON");
        assert_eq!(policy, RuleSet::smart_building_policy());

        assert!(matches!(
            RuleSet::from_json_str("{\"rules\": 7}"),
            Err(PolicyError::Json(_))
        ));
        assert!(matches!(
            RuleSet::from_toml_str("rules = ["),
            Err(PolicyError::Toml(_))
        ));
    }
}
