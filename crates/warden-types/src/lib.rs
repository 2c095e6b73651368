//! # warden-types: Core types for `Warden`
//!
//! Identifier types shared across the `Warden` crates:
//! - Subject identifiers ([`SubjectId`])
//! - Device identifiers ([`DeviceId`])
//! - Hardware addresses ([`MacAddress`])
//!
//! Identifiers are opaque strings owned by the attribute store. Emptiness is
//! representable on purpose: an empty identifier is a caller error that the
//! resolver reports separately from "not found".

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced when parsing identifier text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid MAC address '{0}': expected six hex octets separated by ':' or '-'")]
    InvalidMacAddress(String),
}

// ============================================================================
// Entity IDs
// ============================================================================

/// Opaque identifier of the subject (user, service) making a request.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identifier of a physical device (lock, thermostat, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// MAC Address
// ============================================================================

/// A 48-bit hardware address.
///
/// Parses `AA:BB:CC:DD:EE:FF` and `aa-bb-cc-dd-ee-ff`; equality is on the
/// octets, so textual case and separator do not matter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl FromStr for MacAddress {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidMacAddress(s.to_string());
        let separator = if s.contains(':') { ':' } else { '-' };

        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(separator);
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl Debug for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("11:22:33:44:55:66"; "colon upper")]
    #[test_case("aa:bb:cc:dd:ee:ff"; "colon lower")]
    #[test_case("AA-BB-CC-DD-EE-FF"; "dash")]
    #[test_case(" 11:22:33:44:55:66 "; "surrounding whitespace")]
    fn parses_valid_mac(text: &str) {
        assert!(text.parse::<MacAddress>().is_ok());
    }

    #[test_case(""; "empty")]
    #[test_case("11:22:33:44:55"; "five octets")]
    #[test_case("11:22:33:44:55:66:77"; "seven octets")]
    #[test_case("11:22:33:44:55:GG"; "non hex")]
    #[test_case("1:22:33:44:55:66"; "short octet")]
    #[test_case("+1:22:33:44:55:66"; "sign prefix")]
    #[test_case("11:22-33:44:55:66"; "mixed separators")]
    fn rejects_invalid_mac(text: &str) {
        assert!(matches!(
            text.parse::<MacAddress>(),
            Err(IdError::InvalidMacAddress(_))
        ));
    }

    #[test]
    fn mac_equality_ignores_case_and_separator() {
        let upper: MacAddress = "77:88:99:AA:BB:CC".parse().unwrap();
        let lower: MacAddress = "77-88-99-aa-bb-cc".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(lower.to_string(), "77:88:99:AA:BB:CC");
    }

    #[test]
    fn mac_serde_uses_text_form() {
        let mac: MacAddress = "11:22:33:44:55:66".parse().unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"11:22:33:44:55:66\"");

        let back: MacAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);

        assert!(serde_json::from_str::<MacAddress>("\"nope\"").is_err());
    }

    #[test]
    fn blank_identifiers() {
        assert!(SubjectId::new("").is_blank());
        assert!(SubjectId::new("   ").is_blank());
        assert!(!SubjectId::new("alice").is_blank());
        assert!(DeviceId::new("").is_blank());
        assert!(!DeviceId::from("device_001").is_blank());
    }

    proptest! {
        /// Property: display output always parses back to the same address
        #[test]
        fn prop_mac_display_parses_back(octets in any::<[u8; 6]>()) {
            let mac = MacAddress::from_octets(octets);
            let parsed: MacAddress = mac.to_string().parse().unwrap();
            prop_assert_eq!(parsed, mac);
        }
    }
}
