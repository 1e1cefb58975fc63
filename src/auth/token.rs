//! Token validation seam.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::Identity;
use crate::error::ChatError;

/// Claim carrying the session-unique id minted at login.
pub const CLAIM_SESSION_ID: &str = "uniquesessionid";
/// Claim carrying the participant's contact string.
pub const CLAIM_CONTACT: &str = "contact";

/// Named string-valued claims extracted from a validated token.
///
/// Carried for the lifetime of a session. Routing never looks at them; they
/// only populate the connect confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, String>);

impl ClaimSet {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a claim, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Returns the claim named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the session-unique id claim.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.get(CLAIM_SESSION_ID)
    }

    /// Returns the contact claim.
    #[must_use]
    pub fn contact(&self) -> Option<&str> {
        self.get(CLAIM_CONTACT)
    }

    /// Returns the number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Verifies bearer tokens presented at WebSocket handshake time.
pub trait TokenValidator: Send + Sync + fmt::Debug {
    /// Validates `token` and returns the identity it names plus its claims.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::AuthenticationFailure`] if the token is
    /// malformed, wrongly signed, expired, or lacks a subject.
    fn validate(&self, token: &str) -> Result<(Identity, ClaimSet), ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_accessors_read_known_claims() {
        let claims = ClaimSet::new()
            .with(CLAIM_SESSION_ID, "abc")
            .with(CLAIM_CONTACT, "alice@example.com");
        assert_eq!(claims.session_id(), Some("abc"));
        assert_eq!(claims.contact(), Some("alice@example.com"));
        assert_eq!(claims.get("role"), None);
        assert_eq!(claims.len(), 2);
    }

    #[test]
    fn serializes_as_flat_object() {
        let claims = ClaimSet::new().with(CLAIM_CONTACT, "555-0100");
        let json = serde_json::to_value(&claims).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "contact": "555-0100" }));
    }
}
