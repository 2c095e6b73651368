//! Attribute resolution.
//!
//! Wraps an [`AttributeStore`] with identifier validation and deadline
//! enforcement. Resolution is a pure read; nothing is cached across calls.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::warn;
use warden_types::{DeviceId, SubjectId};

use crate::attributes::{AttributeKind, DevicePairing, SubjectAttributes};
use crate::store::{AttributeStore, StoreError};

/// Why an attribute could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The caller passed an empty identifier.
    #[error("invalid {0:?} identifier: must not be empty")]
    InvalidIdentifier(AttributeKind),

    /// The store has no record for the identifier.
    #[error("no {0:?} record found")]
    NotFound(AttributeKind),

    /// The lookup did not complete before the evaluation deadline.
    #[error("{0:?} lookup timed out")]
    Timeout(AttributeKind),

    /// The store reported an infrastructure fault.
    #[error("{kind:?} lookup failed: {message}")]
    Unavailable { kind: AttributeKind, message: String },
}

/// Looks up subject and device attributes for the engine.
#[derive(Clone)]
pub struct AttributeResolver {
    store: Arc<dyn AttributeStore>,
}

impl AttributeResolver {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store }
    }

    /// Resolves the attributes of a subject.
    pub fn resolve_subject(
        &self,
        id: &SubjectId,
        deadline: Instant,
    ) -> Result<SubjectAttributes, ResolveError> {
        const KIND: AttributeKind = AttributeKind::Subject;

        if id.is_blank() {
            return Err(ResolveError::InvalidIdentifier(KIND));
        }
        check_deadline(KIND, id.as_str(), deadline)?;

        let result = self.store.subject_attributes(id, deadline);
        finish(KIND, id.as_str(), result, deadline)
    }

    /// Resolves the pairing record of a device.
    pub fn resolve_device_pairing(
        &self,
        id: &DeviceId,
        deadline: Instant,
    ) -> Result<DevicePairing, ResolveError> {
        const KIND: AttributeKind = AttributeKind::DevicePairing;

        if id.is_blank() {
            return Err(ResolveError::InvalidIdentifier(KIND));
        }
        check_deadline(KIND, id.as_str(), deadline)?;

        let result = self.store.device_pairing(id, deadline);
        finish(KIND, id.as_str(), result, deadline)
    }
}

impl std::fmt::Debug for AttributeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeResolver").finish_non_exhaustive()
    }
}

fn check_deadline(kind: AttributeKind, id: &str, deadline: Instant) -> Result<(), ResolveError> {
    if Instant::now() >= deadline {
        warn!(kind = ?kind, id, "Deadline passed before attribute lookup");
        return Err(ResolveError::Timeout(kind));
    }
    Ok(())
}

/// Maps a store answer to a resolution result. Answers arriving at or after
/// the deadline are discarded.
fn finish<T>(
    kind: AttributeKind,
    id: &str,
    result: Result<Option<T>, StoreError>,
    deadline: Instant,
) -> Result<T, ResolveError> {
    if Instant::now() >= deadline {
        warn!(kind = ?kind, id, "Attribute lookup answered after deadline");
        return Err(ResolveError::Timeout(kind));
    }

    match result {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(ResolveError::NotFound(kind)),
        Err(StoreError::Timeout) => {
            warn!(kind = ?kind, id, "Attribute store timed out");
            Err(ResolveError::Timeout(kind))
        }
        Err(StoreError::Unavailable(message)) => {
            warn!(kind = ?kind, id, error = %message, "Attribute store unavailable");
            Err(ResolveError::Unavailable { kind, message })
        }
    }
}
