//! Predicate library.
//!
//! A predicate is a named, pure boolean check over the request and the
//! attributes resolved for it. Every builtin follows the same mismatch
//! policy: if any datum it compares is absent, the result is `false`.
//!
//! The [`PredicateRegistry`] is fixed when the engine is built. New checks
//! are added by registering another name; the engine itself never changes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warden_types::MacAddress;

use crate::attributes::{AttributeKind, ResolvedAttributes};
use crate::policy::PolicyError;
use crate::request::{Request, keys};

/// Names of the builtin predicates.
pub mod names {
    pub const TIME_WINDOW_VALID: &str = "time_window_valid";
    pub const LOCATION_MATCHES: &str = "location_matches";
    pub const DEVICE_PAIRING_MATCHES: &str = "device_pairing_matches";
    pub const ROLE_IS: &str = "role_is";
    pub const DEVICE_TYPE_IS: &str = "device_type_is";
    pub const CONTEXT_EQUALS: &str = "context_equals";
}

// ============================================================================
// Arguments
// ============================================================================

/// Static arguments of one predicate invocation, taken from the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateArgs(BTreeMap<String, String>);

impl PredicateArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument (builder pattern).
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns a non-empty argument or a message naming the missing key.
    pub fn require(&self, key: &str) -> Result<&str, String> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            Some(_) => Err(format!("argument '{key}' must not be empty")),
            None => Err(format!("missing required argument '{key}'")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for PredicateArgs {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(), |args, (key, value)| args.with(key, value))
    }
}

// ============================================================================
// Predicate trait
// ============================================================================

/// A named boolean check.
///
/// Implementations must be pure: no side effects, no interior state, the same
/// inputs always give the same answer.
pub trait Predicate: Send + Sync {
    /// Attribute kinds that must be resolved before [`Predicate::evaluate`]
    /// is called. If any of them cannot be resolved the predicate is treated
    /// as `false` without being invoked.
    fn requires(&self) -> &[AttributeKind] {
        &[]
    }

    /// Validates invocation arguments when a rule set is loaded.
    fn check_args(&self, _args: &PredicateArgs) -> Result<(), String> {
        Ok(())
    }

    fn evaluate(
        &self,
        args: &PredicateArgs,
        request: &Request,
        attributes: &ResolvedAttributes<'_>,
    ) -> bool;
}

/// Adapts a closure into a [`Predicate`].
pub struct FnPredicate<F> {
    requires: Vec<AttributeKind>,
    check: F,
}

/// Builds a predicate from a closure and the attribute kinds it reads.
pub fn predicate_fn<F>(requires: &[AttributeKind], check: F) -> FnPredicate<F>
where
    F: Fn(&PredicateArgs, &Request, &ResolvedAttributes<'_>) -> bool + Send + Sync,
{
    FnPredicate {
        requires: requires.to_vec(),
        check,
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&PredicateArgs, &Request, &ResolvedAttributes<'_>) -> bool + Send + Sync,
{
    fn requires(&self) -> &[AttributeKind] {
        &self.requires
    }

    fn evaluate(
        &self,
        args: &PredicateArgs,
        request: &Request,
        attributes: &ResolvedAttributes<'_>,
    ) -> bool {
        (self.check)(args, request, attributes)
    }
}

// ============================================================================
// Builtins
// ============================================================================

/// `context.time_of_day` equals the `window` argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindowValid;

impl Predicate for TimeWindowValid {
    fn check_args(&self, args: &PredicateArgs) -> Result<(), String> {
        args.require("window").map(|_| ())
    }

    fn evaluate(&self, args: &PredicateArgs, request: &Request, _: &ResolvedAttributes<'_>) -> bool {
        match (args.get("window"), request.context_value(keys::TIME_OF_DAY)) {
            (Some(window), Some(current)) => window == current,
            _ => false,
        }
    }
}

/// `context.location` equals the subject's assigned location.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationMatches;

impl Predicate for LocationMatches {
    fn requires(&self) -> &[AttributeKind] {
        &[AttributeKind::Subject]
    }

    fn evaluate(
        &self,
        _args: &PredicateArgs,
        request: &Request,
        attributes: &ResolvedAttributes<'_>,
    ) -> bool {
        let assigned = attributes
            .subject
            .and_then(|s| s.assigned_location.as_deref());
        match (request.context_value(keys::LOCATION), assigned) {
            (Some(current), Some(assigned)) => current == assigned,
            _ => false,
        }
    }
}

/// The claimed MAC in `extra.mac` equals the MAC the target device is paired
/// with. An unparsable claim never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevicePairingMatches;

impl Predicate for DevicePairingMatches {
    fn requires(&self) -> &[AttributeKind] {
        &[AttributeKind::DevicePairing]
    }

    fn evaluate(
        &self,
        _args: &PredicateArgs,
        request: &Request,
        attributes: &ResolvedAttributes<'_>,
    ) -> bool {
        let Some(pairing) = attributes.device_pairing else {
            return false;
        };
        if request.object.device_id.as_ref() != Some(&pairing.device_id) {
            return false;
        }
        request
            .extra_value(keys::MAC)
            .and_then(|claimed| claimed.parse::<MacAddress>().ok())
            .is_some_and(|claimed| claimed == pairing.mac_address)
    }
}

/// The subject's role equals the `role` argument exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleIs;

impl Predicate for RoleIs {
    fn requires(&self) -> &[AttributeKind] {
        &[AttributeKind::Subject]
    }

    fn check_args(&self, args: &PredicateArgs) -> Result<(), String> {
        args.require("role").map(|_| ())
    }

    fn evaluate(&self, args: &PredicateArgs, _: &Request, attributes: &ResolvedAttributes<'_>) -> bool {
        match (args.get("role"), attributes.subject) {
            (Some(role), Some(subject)) => subject.role == role,
            _ => false,
        }
    }
}

/// `object.device_type` equals the `device_type` argument exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceTypeIs;

impl Predicate for DeviceTypeIs {
    fn check_args(&self, args: &PredicateArgs) -> Result<(), String> {
        args.require("device_type").map(|_| ())
    }

    fn evaluate(&self, args: &PredicateArgs, request: &Request, _: &ResolvedAttributes<'_>) -> bool {
        args.get("device_type")
            .is_some_and(|device_type| request.object.device_type == device_type)
    }
}

/// A context attribute named by `key` equals `value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextEquals;

impl Predicate for ContextEquals {
    fn check_args(&self, args: &PredicateArgs) -> Result<(), String> {
        args.require("key")?;
        args.require("value").map(|_| ())
    }

    fn evaluate(&self, args: &PredicateArgs, request: &Request, _: &ResolvedAttributes<'_>) -> bool {
        match (args.get("key"), args.get("value")) {
            (Some(key), Some(expected)) => request.context_value(key) == Some(expected),
            _ => false,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Named predicates available to rule sets.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every builtin predicate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Arc<dyn Predicate>); 6] = [
            (names::TIME_WINDOW_VALID, Arc::new(TimeWindowValid)),
            (names::LOCATION_MATCHES, Arc::new(LocationMatches)),
            (names::DEVICE_PAIRING_MATCHES, Arc::new(DevicePairingMatches)),
            (names::ROLE_IS, Arc::new(RoleIs)),
            (names::DEVICE_TYPE_IS, Arc::new(DeviceTypeIs)),
            (names::CONTEXT_EQUALS, Arc::new(ContextEquals)),
        ];
        for (name, predicate) in builtins {
            registry.predicates.insert(name.to_string(), predicate);
        }
        registry
    }

    /// Registers a predicate under a new name.
    pub fn register(
        &mut self,
        name: &str,
        predicate: impl Predicate + 'static,
    ) -> Result<(), PolicyError> {
        if self.predicates.contains_key(name) {
            return Err(PolicyError::DuplicatePredicate {
                predicate: name.to_string(),
            });
        }
        self.predicates
            .insert(name.to_string(), Arc::new(predicate));
        Ok(())
    }

    /// Registers a predicate (builder pattern).
    pub fn with_predicate(
        mut self,
        name: &str,
        predicate: impl Predicate + 'static,
    ) -> Result<Self, PolicyError> {
        self.register(name, predicate)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Predicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.names())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{DevicePairing, SubjectAttributes};
    use crate::request::WORKING_HOURS;

    fn none() -> ResolvedAttributes<'static> {
        ResolvedAttributes::default()
    }

    #[test]
    fn test_time_window_valid() {
        let args = PredicateArgs::from([("window", WORKING_HOURS)]);
        let request = Request::new("alice", "Smart_Lock");

        assert!(
            !TimeWindowValid.evaluate(&args, &request, &none()),
            "missing time_of_day must not match"
        );

        let request = request.with_context(keys::TIME_OF_DAY, WORKING_HOURS);
        assert!(TimeWindowValid.evaluate(&args, &request, &none()));

        let request = request.with_context(keys::TIME_OF_DAY, "non_working_hours");
        assert!(!TimeWindowValid.evaluate(&args, &request, &none()));

        let request = request.with_context(keys::TIME_OF_DAY, "lunch");
        assert!(!TimeWindowValid.evaluate(&args, &request, &none()));
    }

    #[test]
    fn test_location_matches() {
        let subject = SubjectAttributes::new("Employee").with_location("floor_3");
        let attrs = ResolvedAttributes {
            subject: Some(&subject),
            device_pairing: None,
        };
        let args = PredicateArgs::new();

        let request = Request::new("alice", "Thermostat").with_context(keys::LOCATION, "floor_3");
        assert!(LocationMatches.evaluate(&args, &request, &attrs));

        let elsewhere = Request::new("alice", "Thermostat").with_context(keys::LOCATION, "floor_2");
        assert!(!LocationMatches.evaluate(&args, &elsewhere, &attrs));

        let nowhere = Request::new("alice", "Thermostat");
        assert!(!LocationMatches.evaluate(&args, &nowhere, &attrs));

        let unassigned = SubjectAttributes::new("Employee");
        let attrs = ResolvedAttributes {
            subject: Some(&unassigned),
            device_pairing: None,
        };
        assert!(!LocationMatches.evaluate(&args, &request, &attrs));
        assert!(!LocationMatches.evaluate(&args, &request, &none()));
    }

    #[test]
    fn test_device_pairing_matches() {
        let pairing = DevicePairing::new("device_001", "11:22:33:44:55:66".parse().unwrap());
        let attrs = ResolvedAttributes {
            subject: None,
            device_pairing: Some(&pairing),
        };
        let args = PredicateArgs::new();
        let base = Request::new("bob", "Smart_Lock").with_device("device_001");

        let claimed = base.clone().with_extra(keys::MAC, "11:22:33:44:55:66");
        assert!(DevicePairingMatches.evaluate(&args, &claimed, &attrs));

        let lowercase = base.clone().with_extra(keys::MAC, "11-22-33-44-55-66");
        assert!(DevicePairingMatches.evaluate(&args, &lowercase, &attrs));

        let mismatched = base.clone().with_extra(keys::MAC, "77:88:99:AA:BB:CC");
        assert!(!DevicePairingMatches.evaluate(&args, &mismatched, &attrs));

        let garbage = base.clone().with_extra(keys::MAC, "not-a-mac");
        assert!(!DevicePairingMatches.evaluate(&args, &garbage, &attrs));

        assert!(!DevicePairingMatches.evaluate(&args, &base, &attrs));
        assert!(!DevicePairingMatches.evaluate(&args, &claimed, &none()));

        let other_device = Request::new("bob", "Smart_Lock")
            .with_device("device_002")
            .with_extra(keys::MAC, "11:22:33:44:55:66");
        assert!(!DevicePairingMatches.evaluate(&args, &other_device, &attrs));
    }

    #[test]
    fn test_role_is_exact() {
        let employee = SubjectAttributes::new("Employee");
        let attrs = ResolvedAttributes {
            subject: Some(&employee),
            device_pairing: None,
        };
        let request = Request::new("alice", "Smart_Lock");

        assert!(RoleIs.evaluate(&PredicateArgs::from([("role", "Employee")]), &request, &attrs));
        assert!(!RoleIs.evaluate(&PredicateArgs::from([("role", "employee")]), &request, &attrs));
        assert!(!RoleIs.evaluate(&PredicateArgs::from([("role", "Visitor")]), &request, &attrs));
        assert!(!RoleIs.evaluate(&PredicateArgs::from([("role", "Employee")]), &request, &none()));
    }

    #[test]
    fn test_device_type_and_context_equals() {
        let request = Request::new("alice", "Smart_Lock").with_context("building", "hq");

        assert!(DeviceTypeIs.evaluate(
            &PredicateArgs::from([("device_type", "Smart_Lock")]),
            &request,
            &none()
        ));
        assert!(!DeviceTypeIs.evaluate(
            &PredicateArgs::from([("device_type", "Thermostat")]),
            &request,
            &none()
        ));

        let args = PredicateArgs::from([("key", "building"), ("value", "hq")]);
        assert!(ContextEquals.evaluate(&args, &request, &none()));
        let args = PredicateArgs::from([("key", "floor"), ("value", "hq")]);
        assert!(!ContextEquals.evaluate(&args, &request, &none()));
    }

    #[test]
    fn test_check_args() {
        assert!(TimeWindowValid.check_args(&PredicateArgs::new()).is_err());
        assert!(
            TimeWindowValid
                .check_args(&PredicateArgs::from([("window", "")]))
                .is_err()
        );
        assert!(RoleIs.check_args(&PredicateArgs::from([("role", "Visitor")])).is_ok());
        assert!(DeviceTypeIs.check_args(&PredicateArgs::new()).is_err());
        assert!(
            ContextEquals
                .check_args(&PredicateArgs::from([("key", "building")]))
                .is_err()
        );
        assert!(LocationMatches.check_args(&PredicateArgs::new()).is_ok());
    }

    #[test]
    fn test_builtin_registry() {
        let registry = PredicateRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![
                "context_equals",
                "device_pairing_matches",
                "device_type_is",
                "location_matches",
                "role_is",
                "time_window_valid",
            ]
        );
        assert_eq!(
            registry.get(names::LOCATION_MATCHES).unwrap().requires(),
            &[AttributeKind::Subject]
        );
        assert!(
            registry
                .get(names::DEVICE_TYPE_IS)
                .unwrap()
                .requires()
                .is_empty()
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = PredicateRegistry::builtin();
        let err = registry
            .register(names::ROLE_IS, predicate_fn(&[], |_, _, _| true))
            .unwrap_err();
        assert!(matches!(err, PolicyError::DuplicatePredicate { .. }));

        let registry = registry
            .with_predicate(
                "weekday_only",
                predicate_fn(&[], |_, request, _| {
                    request.context_value("day") != Some("saturday")
                }),
            )
            .unwrap();
        assert!(registry.contains("weekday_only"));
    }
}
