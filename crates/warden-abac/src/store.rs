//! Attribute store interface.
//!
//! The store owns subject and device-pairing records; the engine only reads.
//! Persistence and updates live outside this crate. [`InMemoryAttributeStore`]
//! is provided for embedding and tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use thiserror::Error;
use warden_types::{DeviceId, SubjectId};

use crate::attributes::{DevicePairing, SubjectAttributes};

/// Infrastructure faults a store may report.
///
/// A missing record is not an error: stores return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("attribute store did not answer before the deadline")]
    Timeout,

    #[error("attribute store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only keyed lookups against an external attribute store.
///
/// Implementations must support concurrent reads. `deadline` is the point in
/// time after which the caller will discard the answer; implementations that
/// do I/O should bound their calls by it and return [`StoreError::Timeout`].
pub trait AttributeStore: Send + Sync {
    fn subject_attributes(
        &self,
        id: &SubjectId,
        deadline: Instant,
    ) -> Result<Option<SubjectAttributes>, StoreError>;

    fn device_pairing(
        &self,
        id: &DeviceId,
        deadline: Instant,
    ) -> Result<Option<DevicePairing>, StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Thread-safe attribute store backed by hash maps.
#[derive(Debug, Default)]
pub struct InMemoryAttributeStore {
    subjects: RwLock<HashMap<SubjectId, SubjectAttributes>>,
    pairings: RwLock<HashMap<DeviceId, DevicePairing>>,
}

impl InMemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subject record (builder pattern).
    pub fn with_subject(self, id: impl Into<SubjectId>, attributes: SubjectAttributes) -> Self {
        self.insert_subject(id, attributes);
        self
    }

    /// Adds a device pairing (builder pattern).
    pub fn with_pairing(self, pairing: DevicePairing) -> Self {
        self.insert_pairing(pairing);
        self
    }

    pub fn insert_subject(&self, id: impl Into<SubjectId>, attributes: SubjectAttributes) {
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), attributes);
    }

    /// Replaces any existing pairing for the same device.
    pub fn insert_pairing(&self, pairing: DevicePairing) {
        self.pairings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pairing.device_id.clone(), pairing);
    }

    pub fn remove_subject(&self, id: &SubjectId) -> Option<SubjectAttributes> {
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn remove_pairing(&self, id: &DeviceId) -> Option<DevicePairing> {
        self.pairings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}

impl AttributeStore for InMemoryAttributeStore {
    fn subject_attributes(
        &self,
        id: &SubjectId,
        _deadline: Instant,
    ) -> Result<Option<SubjectAttributes>, StoreError> {
        Ok(self
            .subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn device_pairing(
        &self,
        id: &DeviceId,
        _deadline: Instant,
    ) -> Result<Option<DevicePairing>, StoreError> {
        Ok(self
            .pairings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}
