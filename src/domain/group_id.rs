//! Type-safe group identifier.
//!
//! [`GroupId`] wraps a [`uuid::Uuid`] filled from 128 random bits so that
//! group ids cannot be guessed or confused with other identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a chat group.
///
/// Generated once by [`super::GroupDirectory::create`] and immutable
/// thereafter. Rendered in hyphenated UUID form on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(uuid::Uuid);

impl GroupId {
    /// Creates a new random `GroupId` with 128 bits of randomness.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::from_bytes(rand::random::<[u8; 16]>()))
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim()).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = GroupId::new();
        let b = GroupId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_uuid_format() {
        let s = GroupId::new().to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(s.matches('-').count(), 4);
    }

    #[test]
    fn parses_its_own_display() {
        let id = GroupId::new();
        let Ok(parsed) = id.to_string().parse::<GroupId>() else {
            panic!("group id should parse");
        };
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_non_uuid_text() {
        assert!("team".parse::<GroupId>().is_err());
    }
}
