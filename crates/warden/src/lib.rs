//! # Warden
//!
//! Attribute-based access decisions for connected buildings.
//!
//! Warden answers one question: may this subject operate this device, right
//! now, from here? Answers come from a data-driven rule set evaluated against
//! subject attributes, device pairings and the request context:
//!
//! - **Default deny** - Only a fully satisfied rule permits
//! - **Fail closed** - Missing or unreachable attributes never grant access
//! - **Atomic reloads** - Evaluations always see one complete rule set
//! - **Explainable** - Every deny carries a reason code and a per-rule trace
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Warden                            │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐ │
//! │  │  Config  │ → │ Rule set  │ → │  Engine  │ → │Decision │ │
//! │  │ (layers) │   │(TOML/JSON)│   │ (lazy)   │   │(+trace) │ │
//! │  └──────────┘   └───────────┘   └────┬─────┘   └─────────┘ │
//! │                                      │                      │
//! │                              ┌───────▼────────┐             │
//! │                              │Attribute store │             │
//! │                              └────────────────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden::{InMemoryAttributeStore, Request, SubjectAttributes, Warden, WardenConfig};
//!
//! let store = InMemoryAttributeStore::new()
//!     .with_subject("alice", SubjectAttributes::new("Employee").with_location("floor_3"));
//!
//! // Reads warden.toml and the rule set it points at
//! let warden = Warden::open(&WardenConfig::load()?, Arc::new(store))?;
//!
//! let decision = warden.evaluate(
//!     &Request::new("alice", "Thermostat").with_context("location", "floor_3"),
//! );
//! ```
//!
//! # Modules
//!
//! - **Entry point**: [`Warden`], [`read_rule_set`]
//! - **Engine**: re-exported from `warden-abac`
//! - **Configuration**: re-exported from `warden-config`

mod warden;

pub use warden::{Warden, read_rule_set};

// Re-export identifier types
pub use warden_types::{DeviceId, IdError, MacAddress, SubjectId};

// Re-export engine types
pub use warden_abac::{
    AttributeKind, AttributeStore, Decision, DecisionEngine, DenyReason, DevicePairing,
    EngineConfig, FailureCause, InMemoryAttributeStore, PolicyError, Predicate, PredicateArgs,
    PredicateRegistry, Request, RequestError, ResolvedAttributes, Rule, RuleSet, RuleStatus,
    RuleTrace, StoreError, SubjectAttributes, predicate_fn,
};

// Re-export predicate names and request keys
pub use warden_abac::predicate::names;
pub use warden_abac::request::{NON_WORKING_HOURS, WORKING_HOURS, keys};

// Re-export configuration
pub use warden_config::{ConfigError, ConfigLoader, WardenConfig};
