//! ABAC decision engine.
//!
//! Evaluates requests against the active rule set. Rules are checked in
//! rule-set order and the first satisfied rule permits. If none is
//! satisfied, the request is denied.
//!
//! Attributes are resolved lazily: a predicate's required attributes are
//! fetched right before it runs, and at most once per evaluation. A rule that
//! fails on a request-only check never causes a lookup.
//!
//! The active rule set is held behind an `Arc` that reloads swap atomically.
//! Each evaluation clones the `Arc` once and works on that snapshot, so
//! concurrent evaluations never observe a partially loaded set.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::attributes::{AttributeKind, DevicePairing, ResolvedAttributes, SubjectAttributes};
use crate::decision::{Decision, DenyReason, FailureCause, RuleStatus, RuleTrace};
use crate::policy::{CompiledRule, CompiledRuleSet, PolicyError, RuleSet};
use crate::predicate::PredicateRegistry;
use crate::request::Request;
use crate::resolver::AttributeResolver;
use crate::store::AttributeStore;

/// Default upper bound on attribute resolution per evaluation.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(250);

/// Stand-in budget for timeouts too large to add to the current instant
/// (e.g. `Duration::MAX` meaning "no timeout").
const UNBOUNDED_RESOLVE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Budget for all attribute lookups of a single `evaluate` call.
    pub resolve_timeout: Duration,
    /// Whether every decision is logged.
    pub audit_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            audit_logging: true,
        }
    }
}

impl EngineConfig {
    /// Sets the lookup budget. Any duration is accepted; one that overflows
    /// the clock is treated as a year.
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_audit_logging(mut self, enabled: bool) -> Self {
        self.audit_logging = enabled;
        self
    }
}

// ============================================================================
// Engine
// ============================================================================

/// One loaded policy version.
struct PolicySnapshot {
    version: u64,
    rules: CompiledRuleSet,
}

/// Evaluates access requests against a rule set.
///
/// Stateless per call: the only state shared between calls is the active
/// rule set, which is immutable once loaded.
pub struct DecisionEngine {
    resolver: AttributeResolver,
    registry: PredicateRegistry,
    config: EngineConfig,
    policy: RwLock<Arc<PolicySnapshot>>,
}

impl DecisionEngine {
    /// Creates an engine with an empty rule set (everything is denied until
    /// a rule set is loaded).
    pub fn new(store: Arc<dyn AttributeStore>, registry: PredicateRegistry) -> Self {
        Self {
            resolver: AttributeResolver::new(store),
            registry,
            config: EngineConfig::default(),
            policy: RwLock::new(Arc::new(PolicySnapshot {
                version: 0,
                rules: CompiledRuleSet::default(),
            })),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.config.audit_logging = false;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    /// Replaces the active rule set.
    ///
    /// The set is compiled against the registry first; on any configuration
    /// error nothing changes. Returns the new policy version.
    pub fn load_rule_set(&self, rule_set: &RuleSet) -> Result<u64, PolicyError> {
        let rules = match rule_set.compile(&self.registry) {
            Ok(rules) => rules,
            Err(err) => {
                warn!(
                    error = %err,
                    active_version = self.policy_version(),
                    "Rule set rejected; keeping active rule set"
                );
                return Err(err);
            }
        };

        let mut active = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        let version = active.version + 1;
        *active = Arc::new(PolicySnapshot { version, rules });
        drop(active);

        info!(
            version,
            rules = rule_set.len(),
            "Rule set loaded"
        );
        Ok(version)
    }

    /// Version of the active rule set; `0` until the first load.
    pub fn policy_version(&self) -> u64 {
        self.snapshot().version
    }

    /// Names of the active rules in evaluation order.
    pub fn rule_names(&self) -> Vec<String> {
        self.snapshot()
            .rules
            .rule_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Evaluates a request, bounding attribute lookups by the configured
    /// resolve timeout.
    pub fn evaluate(&self, request: &Request) -> Decision {
        let deadline = deadline_after(Instant::now(), self.config.resolve_timeout);
        self.evaluate_with_deadline(request, deadline)
    }

    /// Evaluates a request with a caller-supplied lookup deadline.
    ///
    /// # Postcondition
    ///
    /// Always returns a `Decision`; `permit` is `true` only if some rule's
    /// full conjunction held.
    pub fn evaluate_with_deadline(&self, request: &Request, deadline: Instant) -> Decision {
        let policy = self.snapshot();

        if let Err(err) = request.validate() {
            if self.config.audit_logging {
                warn!(
                    error = %err,
                    reason = %DenyReason::StructuralError,
                    "Access denied"
                );
            }
            return Decision::structural_error(err.to_string(), policy.version);
        }

        let mut lookups = Lookups::new(&self.resolver, request, deadline);
        let mut trace = Vec::with_capacity(policy.rules.len());
        let mut transient_failure = false;

        for rule in policy.rules.rules() {
            match evaluate_rule(rule, request, &mut lookups) {
                RuleStatus::Matched => {
                    trace.push(RuleTrace {
                        rule: rule.name.clone(),
                        status: RuleStatus::Matched,
                    });
                    if self.config.audit_logging {
                        info!(
                            subject = %request.subject_id,
                            device_type = %request.object.device_type,
                            rule = %rule.name,
                            version = policy.version,
                            "Access granted"
                        );
                    }
                    return Decision::permit(&rule.name, policy.version, trace);
                }
                status @ RuleStatus::Failed { .. } => {
                    if let RuleStatus::Failed {
                        predicate, cause, ..
                    } = &status
                    {
                        debug!(rule = %rule.name, predicate = %predicate, cause = ?cause, "Rule not satisfied");
                        transient_failure |= cause.is_transient();
                    }
                    trace.push(RuleTrace {
                        rule: rule.name.clone(),
                        status,
                    });
                }
            }
        }

        let reason = if transient_failure {
            DenyReason::AttributeUnavailable
        } else {
            DenyReason::NoMatchingRule
        };

        if self.config.audit_logging {
            warn!(
                subject = %request.subject_id,
                device_type = %request.object.device_type,
                reason = %reason,
                version = policy.version,
                "Access denied"
            );
        }

        Decision::deny(reason, policy.version, trace)
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.policy.read().unwrap_or_else(PoisonError::into_inner))
    }
}

// ============================================================================
// Rule evaluation
// ============================================================================

/// `now + timeout`, saturating instead of panicking on clock overflow.
fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .or_else(|| now.checked_add(UNBOUNDED_RESOLVE_TIMEOUT))
        .unwrap_or(now)
}

/// Runs a rule's predicates left to right, stopping at the first failure.
fn evaluate_rule(rule: &CompiledRule, request: &Request, lookups: &mut Lookups<'_>) -> RuleStatus {
    for (index, step) in rule.predicates.iter().enumerate() {
        let outcome = step
            .requires()
            .iter()
            .try_for_each(|kind| lookups.ensure(*kind))
            .and_then(|()| {
                if step
                    .predicate
                    .evaluate(&step.args, request, &lookups.attributes())
                {
                    Ok(())
                } else {
                    Err(FailureCause::PredicateFalse)
                }
            });

        if let Err(cause) = outcome {
            return RuleStatus::Failed {
                predicate_index: index,
                predicate: step.name.clone(),
                cause,
            };
        }
    }
    RuleStatus::Matched
}

/// Attribute lookups memoised for the duration of one evaluation.
///
/// Failures are memoised too, so a timed-out store is not hit again by the
/// next rule.
struct Lookups<'a> {
    resolver: &'a AttributeResolver,
    request: &'a Request,
    deadline: Instant,
    subject: Option<Result<SubjectAttributes, FailureCause>>,
    device_pairing: Option<Result<DevicePairing, FailureCause>>,
}

impl<'a> Lookups<'a> {
    fn new(resolver: &'a AttributeResolver, request: &'a Request, deadline: Instant) -> Self {
        Self {
            resolver,
            request,
            deadline,
            subject: None,
            device_pairing: None,
        }
    }

    fn ensure(&mut self, kind: AttributeKind) -> Result<(), FailureCause> {
        let outcome = match kind {
            AttributeKind::Subject => self
                .subject
                .get_or_insert_with(|| {
                    self.resolver
                        .resolve_subject(&self.request.subject_id, self.deadline)
                        .map_err(|err| FailureCause::from(&err))
                })
                .as_ref()
                .map(|_| ()),
            AttributeKind::DevicePairing => self
                .device_pairing
                .get_or_insert_with(|| match &self.request.object.device_id {
                    Some(device_id) => self
                        .resolver
                        .resolve_device_pairing(device_id, self.deadline)
                        .map_err(|err| FailureCause::from(&err)),
                    None => Err(FailureCause::NoDevice),
                })
                .as_ref()
                .map(|_| ()),
        };
        outcome.map_err(|cause| *cause)
    }

    fn attributes(&self) -> ResolvedAttributes<'_> {
        ResolvedAttributes {
            subject: self.subject.as_ref().and_then(|r| r.as_ref().ok()),
            device_pairing: self.device_pairing.as_ref().and_then(|r| r.as_ref().ok()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
