//! Decision types.
//!
//! A [`Decision`] is produced fresh for every evaluation and carries, besides
//! the permit bit, enough diagnostics to explain a deny: a stable reason code
//! and a per-rule trace naming the predicate that failed and why.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKind;
use crate::resolver::ResolveError;

// ============================================================================
// Deny reason
// ============================================================================

/// Stable diagnostic code attached to every deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The request was malformed; no rule was evaluated.
    StructuralError,
    /// No rule's conjunction held.
    NoMatchingRule,
    /// No rule matched and at least one rule failed because an attribute
    /// lookup timed out or the store was unavailable.
    AttributeUnavailable,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StructuralError => "structural_error",
            Self::NoMatchingRule => "no_matching_rule",
            Self::AttributeUnavailable => "attribute_unavailable",
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Trace
// ============================================================================

/// Why a predicate counted as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The predicate ran and returned `false`.
    PredicateFalse,
    /// The store has no record for the required attribute.
    AttributeNotFound(AttributeKind),
    /// The lookup did not finish before the deadline.
    AttributeTimeout(AttributeKind),
    /// The store reported a fault.
    AttributeUnavailable(AttributeKind),
    /// A device-scoped predicate ran against a request without a device id.
    NoDevice,
    /// The identifier used for the lookup was empty.
    InvalidIdentifier(AttributeKind),
}

impl FailureCause {
    /// Returns `true` when the failure came from infrastructure rather than
    /// from the policy or the data.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AttributeTimeout(_) | Self::AttributeUnavailable(_)
        )
    }
}

impl From<&ResolveError> for FailureCause {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::InvalidIdentifier(kind) => Self::InvalidIdentifier(*kind),
            ResolveError::NotFound(kind) => Self::AttributeNotFound(*kind),
            ResolveError::Timeout(kind) => Self::AttributeTimeout(*kind),
            ResolveError::Unavailable { kind, .. } => Self::AttributeUnavailable(*kind),
        }
    }
}

/// Outcome of one evaluated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RuleStatus {
    Matched,
    Failed {
        /// Zero-based position of the failing predicate within the rule.
        predicate_index: usize,
        predicate: String,
        cause: FailureCause,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTrace {
    pub rule: String,
    #[serde(flatten)]
    pub status: RuleStatus,
}

// ============================================================================
// Decision
// ============================================================================

/// The result of evaluating an access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub permit: bool,
    /// The first rule (in rule-set order) whose conjunction held.
    pub matched_rule: Option<String>,
    /// Set if and only if `permit` is `false`.
    pub reason: Option<DenyReason>,
    /// Human-readable detail for structural errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Version of the rule set the request was evaluated against.
    pub policy_version: u64,
    /// Rules evaluated, in order, up to and including the matching one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<RuleTrace>,
}

impl Decision {
    pub(crate) fn permit(rule: &str, policy_version: u64, trace: Vec<RuleTrace>) -> Self {
        Self {
            permit: true,
            matched_rule: Some(rule.to_string()),
            reason: None,
            detail: None,
            policy_version,
            trace,
        }
    }

    pub(crate) fn deny(reason: DenyReason, policy_version: u64, trace: Vec<RuleTrace>) -> Self {
        Self {
            permit: false,
            matched_rule: None,
            reason: Some(reason),
            detail: None,
            policy_version,
            trace,
        }
    }

    pub(crate) fn structural_error(detail: String, policy_version: u64) -> Self {
        Self {
            detail: Some(detail),
            ..Self::deny(DenyReason::StructuralError, policy_version, Vec::new())
        }
    }

    pub fn is_permit(&self) -> bool {
        self.permit
    }

    /// Returns the failure recorded for `rule`, if it was evaluated and failed.
    pub fn failure_of(&self, rule: &str) -> Option<(&str, FailureCause)> {
        self.trace
            .iter()
            .find(|t| t.rule == rule)
            .and_then(|t| match &t.status {
                RuleStatus::Failed {
                    predicate, cause, ..
                } => Some((predicate.as_str(), *cause)),
                RuleStatus::Matched => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(DenyReason::StructuralError.code(), "structural_error");
        assert_eq!(DenyReason::NoMatchingRule.to_string(), "no_matching_rule");
        assert_eq!(
            serde_json::to_value(DenyReason::AttributeUnavailable).unwrap(),
            "attribute_unavailable"
        );
    }

    #[test]
    fn test_structural_error_is_deny() {
        let decision = Decision::structural_error("missing subject".to_string(), 3);
        assert!(!decision.is_permit());
        assert_eq!(decision.reason, Some(DenyReason::StructuralError));
        assert_eq!(decision.detail.as_deref(), Some("missing subject"));
        assert!(decision.matched_rule.is_none());
    }

    #[test]
    fn test_decision_wire_shape() {
        let trace = vec![RuleTrace {
            rule: "visitor-lock-rule".to_string(),
            status: RuleStatus::Failed {
                predicate_index: 3,
                predicate: "device_pairing_matches".to_string(),
                cause: FailureCause::AttributeNotFound(AttributeKind::DevicePairing),
            },
        }];
        let decision = Decision::deny(DenyReason::NoMatchingRule, 1, trace);
        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["permit"], false);
        assert_eq!(json["reason"], "no_matching_rule");
        assert!(json["matched_rule"].is_null());
        assert_eq!(json["trace"][0]["status"], "failed");
        assert_eq!(json["trace"][0]["predicate_index"], 3);
        assert_eq!(
            json["trace"][0]["cause"]["attribute_not_found"],
            "device_pairing"
        );

        assert_eq!(
            decision.failure_of("visitor-lock-rule"),
            Some((
                "device_pairing_matches",
                FailureCause::AttributeNotFound(AttributeKind::DevicePairing)
            ))
        );
        assert!(decision.failure_of("employee-lock-rule").is_none());
    }

    #[test]
    fn test_transient_causes() {
        assert!(FailureCause::AttributeTimeout(AttributeKind::Subject).is_transient());
        assert!(FailureCause::AttributeUnavailable(AttributeKind::Subject).is_transient());
        assert!(!FailureCause::AttributeNotFound(AttributeKind::Subject).is_transient());
        assert!(!FailureCause::PredicateFalse.is_transient());
    }
}
