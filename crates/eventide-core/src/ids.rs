//! Identifier types for eventide.
//!
//! This module provides strongly-typed identifiers for users, billing records,
//! and check-ins.
//!
//! # Macro-based ID Types
//!
//! The `opaque_id_type!` macro reduces boilerplate for string-backed
//! identifier types minted by external systems (the identity provider, the
//! payment processor), ensuring consistent validation, serialization,
//! parsing, and display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Maximum accepted length of an opaque identifier, in bytes.
pub const MAX_ID_LEN: usize = 128;

fn validate_opaque(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdError::InvalidCharacter);
    }
    Ok(())
}

/// Macro to define an opaque string-backed identifier type with standard
/// trait implementations.
///
/// This macro generates a newtype wrapper around `String` with
/// implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `Serialize`, `Deserialize` (as string, validated)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
/// - `AsRef<[u8]>` (for store key construction)
///
/// # Example
///
/// ```ignore
/// opaque_id_type!(MyRef, "A custom reference type.");
/// let id: MyRef = "abc_123".parse().unwrap();
/// assert_eq!(id.as_str(), "abc_123");
/// ```
macro_rules! opaque_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a raw string, validating it.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is empty, too long, or
            /// contains whitespace or control characters.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate_opaque(&raw)?;
                Ok(Self(raw))
            }

            /// Generate a new random identifier (primarily for testing).
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().simple().to_string())
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate_opaque(&value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

// Define opaque identifier types using the macro
opaque_id_type!(UserId, "A user identifier issued by the identity provider.\n\nUser IDs are opaque stable strings extracted from JWT `sub` claims; no\nstructure beyond the validation rules is assumed.");
opaque_id_type!(CustomerRef, "A billing-customer reference assigned by the payment processor.\n\nDistinct from the application's own user id; once linked to an account it\nis never reassigned.");
opaque_id_type!(SubscriptionRef, "A subscription reference assigned by the payment processor.\n\nNullable on the account: cleared when the subscription is deleted.");

/// A check-in identifier using ULID for time-ordering.
///
/// Check-in IDs are time-ordered so history listings can walk the store in
/// natural chronological order without a secondary index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckInId(Ulid);

impl CheckInId {
    /// Create a new `CheckInId` from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Generate a new `CheckInId` with the current timestamp.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Return the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> &Ulid {
        &self.0
    }

    /// Return the bytes of the ULID (16 bytes).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Create a `CheckInId` from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid.
    pub fn from_bytes(bytes: [u8; 16]) -> Result<Self, IdError> {
        Ok(Self(Ulid::from_bytes(bytes)))
    }
}

impl FromStr for CheckInId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for CheckInId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckInId({})", self.0)
    }
}

impl fmt::Display for CheckInId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CheckInId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CheckInId> for String {
    fn from(id: CheckInId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty.
    #[error("identifier is empty")]
    Empty,

    /// The input exceeds the maximum length.
    #[error("identifier exceeds {MAX_ID_LEN} bytes")]
    TooLong,

    /// The input contains whitespace or control characters.
    #[error("identifier contains whitespace or control characters")]
    InvalidCharacter,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_roundtrip() {
        let id = UserId::generate();
        let str_repr = id.to_string();
        let parsed = UserId::from_str(&str_repr).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn user_id_serde_json() {
        let id = UserId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn user_id_accepts_provider_style_ids() {
        let id: UserId = "Nx7qLpBfYcRt2sWvA9eKdGjHuZ41".parse().unwrap();
        assert_eq!(id.as_str(), "Nx7qLpBfYcRt2sWvA9eKdGjHuZ41");
    }

    #[test]
    fn user_id_rejects_empty() {
        assert_eq!("".parse::<UserId>(), Err(IdError::Empty));
    }

    #[test]
    fn user_id_rejects_whitespace() {
        assert_eq!("abc def".parse::<UserId>(), Err(IdError::InvalidCharacter));
        assert_eq!("abc\n".parse::<UserId>(), Err(IdError::InvalidCharacter));
    }

    #[test]
    fn user_id_rejects_overlong() {
        let raw = "x".repeat(MAX_ID_LEN + 1);
        assert_eq!(raw.parse::<UserId>(), Err(IdError::TooLong));
    }

    #[test]
    fn customer_ref_roundtrip() {
        let id: CustomerRef = "cus_OyLt4aJq".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: CustomerRef = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn check_in_id_roundtrip() {
        let id = CheckInId::generate();
        let str_repr = id.to_string();
        let parsed = CheckInId::from_str(&str_repr).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn check_in_id_bytes_roundtrip() {
        let id = CheckInId::generate();
        let bytes = id.to_bytes();
        let parsed = CheckInId::from_bytes(bytes).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn check_in_ids_are_time_ordered() {
        let a = CheckInId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = CheckInId::generate();
        assert!(b.to_bytes() > a.to_bytes());
    }
}
