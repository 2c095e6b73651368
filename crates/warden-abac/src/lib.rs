//! # warden-abac: Attribute-Based Access Control
//!
//! Decides whether a subject may operate a device, based on subject
//! attributes, device pairing records and the request context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Request                                     │
//! │  (Subject + Device + Context + Extra)        │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision Engine                             │
//! │  ├─ Evaluate rules in rule-set order         │
//! │  ├─ Resolve attributes on first use          │
//! │  └─ First satisfied rule permits             │
//! └──────────┬──────────────────────┬───────────┘
//!            │                      │
//!            ▼                      ▼
//! ┌────────────────────┐  ┌────────────────────┐
//! │ Predicate Registry │  │ Attribute Resolver │
//! │ (named checks)     │  │ (store + deadline) │
//! └────────────────────┘  └────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - Permit / deny                             │
//! │  - Matched rule or deny reason               │
//! │  - Per-rule trace                            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Anything not explicitly permitted by a rule is denied. A missing,
//! late or unreachable attribute makes the predicate that needed it false.
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use warden_abac::{
//!     DecisionEngine, InMemoryAttributeStore, PredicateRegistry, Request, RuleSet,
//!     SubjectAttributes,
//! };
//! use warden_abac::request::{WORKING_HOURS, keys};
//!
//! let store = InMemoryAttributeStore::new()
//!     .with_subject("alice", SubjectAttributes::new("Employee").with_location("floor_3"));
//!
//! let engine = DecisionEngine::new(Arc::new(store), PredicateRegistry::builtin());
//! engine.load_rule_set(&RuleSet::smart_building_policy()).unwrap();
//!
//! let request = Request::new("alice", "Smart_Lock")
//!     .with_context(keys::TIME_OF_DAY, WORKING_HOURS);
//!
//! let decision = engine.evaluate(&request);
//! assert!(decision.permit);
//! assert_eq!(decision.matched_rule.as_deref(), Some("employee-lock-rule"));
//! ```

pub mod attributes;
pub mod decision;
pub mod evaluator;
pub mod policy;
pub mod predicate;
pub mod request;
pub mod resolver;
pub mod store;


pub use attributes::{AttributeKind, DevicePairing, ResolvedAttributes, SubjectAttributes};
pub use decision::{Decision, DenyReason, FailureCause, RuleStatus, RuleTrace};
pub use evaluator::{DecisionEngine, EngineConfig};
pub use policy::{CompiledRuleSet, PolicyError, PredicateCall, Rule, RuleSet};
pub use predicate::{Predicate, PredicateArgs, PredicateRegistry, predicate_fn};
pub use request::{ObjectRef, Request, RequestError};
pub use resolver::{AttributeResolver, ResolveError};
pub use store::{AttributeStore, InMemoryAttributeStore, StoreError};
