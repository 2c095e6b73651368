//! Attribute types for ABAC evaluation.
//!
//! Two record kinds come from the attribute store:
//! - **Subject attributes**: Role and assigned location of the requester
//! - **Device pairings**: The hardware address a device is paired with
//!
//! The engine never keeps these beyond a single evaluation.

use serde::{Deserialize, Serialize};
use warden_types::{DeviceId, MacAddress};

// ============================================================================
// Attribute Kind
// ============================================================================

/// A category of attribute that has to be fetched from the attribute store.
///
/// Predicates declare the kinds they need so the engine resolves lazily:
/// a rule that fails on a request-only check never triggers a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Attributes of the requesting subject, keyed by `subject_id`.
    Subject,
    /// Pairing record of the target device, keyed by `object.device_id`.
    DevicePairing,
}

// ============================================================================
// Subject Attributes
// ============================================================================

/// Attributes describing the subject making the access request.
///
/// `role` is compared verbatim against policy values. A role the policy does
/// not mention therefore never matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAttributes {
    /// The subject's role (e.g., "Employee", "Visitor").
    pub role: String,
    /// Location the subject is assigned to (e.g., "floor_3").
    pub assigned_location: Option<String>,
}

impl SubjectAttributes {
    /// Creates subject attributes with no assigned location.
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            assigned_location: None,
        }
    }

    /// Sets the assigned location.
    pub fn with_location(mut self, location: &str) -> Self {
        self.assigned_location = Some(location.to_string());
        self
    }
}

// ============================================================================
// Device Pairing
// ============================================================================

/// One-to-one pairing between a device and the hardware address allowed to
/// operate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePairing {
    pub device_id: DeviceId,
    pub mac_address: MacAddress,
}

impl DevicePairing {
    pub fn new(device_id: impl Into<DeviceId>, mac_address: MacAddress) -> Self {
        Self {
            device_id: device_id.into(),
            mac_address,
        }
    }
}

// ============================================================================
// Resolved Attributes
// ============================================================================

/// The attributes resolved so far for the current evaluation.
///
/// A field is `None` when it was not needed yet or its lookup failed; the
/// engine only invokes a predicate once every kind it requires is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedAttributes<'a> {
    pub subject: Option<&'a SubjectAttributes>,
    pub device_pairing: Option<&'a DevicePairing>,
}
