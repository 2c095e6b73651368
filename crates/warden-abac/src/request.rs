//! Access request model.
//!
//! A [`Request`] is built per evaluation call and never stored by the engine.
//! It carries the subject identifier, the object being accessed, free-form
//! context attributes, and predicate-specific extras such as a claimed MAC.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_types::{DeviceId, SubjectId};

/// Well-known keys in [`Request::context`] and [`Request::extra`].
pub mod keys {
    /// Context key naming the current time window (e.g. `working_hours`).
    pub const TIME_OF_DAY: &str = "time_of_day";
    /// Context key naming where the request originates (e.g. `floor_3`).
    pub const LOCATION: &str = "location";
    /// Extra key carrying the MAC address the caller claims to use.
    pub const MAC: &str = "mac";
}

/// Time window value for weekdays 09:00-17:00 UTC.
pub const WORKING_HOURS: &str = "working_hours";
/// Time window value for every other time.
pub const NON_WORKING_HOURS: &str = "non_working_hours";

// ============================================================================
// Errors
// ============================================================================

/// Structural problems with a request. These always produce a deny.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request is missing a subject id")]
    MissingSubjectId,

    #[error("request is missing the object device type")]
    MissingDeviceType,

    #[error("request object carries an empty device id")]
    EmptyDeviceId,
}

// ============================================================================
// Request
// ============================================================================

/// The object an access request targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Open-ended device type tag (e.g. "Smart_Lock", "Thermostat").
    #[serde(default)]
    pub device_type: String,
    /// Needed only by device-scoped predicates.
    #[serde(default)]
    pub device_id: Option<DeviceId>,
}

impl ObjectRef {
    pub fn new(device_type: &str) -> Self {
        Self {
            device_type: device_type.to_string(),
            device_id: None,
        }
    }
}

/// An access request.
///
/// Missing wire fields deserialize to empty values so that they surface as a
/// structural deny from the engine rather than a transport error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub subject_id: SubjectId,
    #[serde(default)]
    pub object: ObjectRef,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Request {
    /// Creates a request for `subject_id` targeting a device of `device_type`.
    pub fn new(subject_id: impl Into<SubjectId>, device_type: &str) -> Self {
        Self {
            subject_id: subject_id.into(),
            object: ObjectRef::new(device_type),
            context: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Sets the target device id.
    pub fn with_device(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.object.device_id = Some(device_id.into());
        self
    }

    /// Sets a context attribute.
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    /// Sets a predicate-specific extra input.
    pub fn with_extra(mut self, key: &str, value: &str) -> Self {
        self.extra.insert(key.to_string(), value.to_string());
        self
    }

    /// Fills [`keys::TIME_OF_DAY`] from a timestamp.
    ///
    /// Working hours are 09:00-17:00 UTC on weekdays (Mon-Fri), end exclusive.
    pub fn with_timestamp(self, ts: DateTime<Utc>) -> Self {
        let window = time_window_for(ts);
        self.with_context(keys::TIME_OF_DAY, window)
    }

    /// Returns a context attribute.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    /// Returns an extra input.
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Checks the fields every evaluation depends on.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.subject_id.is_blank() {
            return Err(RequestError::MissingSubjectId);
        }
        if self.object.device_type.trim().is_empty() {
            return Err(RequestError::MissingDeviceType);
        }
        if self.object.device_id.as_ref().is_some_and(DeviceId::is_blank) {
            return Err(RequestError::EmptyDeviceId);
        }
        Ok(())
    }
}

/// Maps a timestamp to [`WORKING_HOURS`] or [`NON_WORKING_HOURS`].
pub fn time_window_for(ts: DateTime<Utc>) -> &'static str {
    let is_weekday = ts.weekday().number_from_monday() <= 5;
    if is_weekday && (9..17).contains(&ts.hour()) {
        WORKING_HOURS
    } else {
        NON_WORKING_HOURS
    }
}
