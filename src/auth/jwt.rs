//! HS256 bearer tokens for chat sessions.
//!
//! [`JwtTokenService`] mints the tokens handed out by the login endpoint and
//! validates them again when a client opens its WebSocket.

use std::collections::HashMap;

use anyhow::bail;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;

use super::token::{CLAIM_CONTACT, CLAIM_SESSION_ID, ClaimSet, TokenValidator};
use crate::domain::Identity;
use crate::error::ChatError;

/// Minimum HS256 secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize)]
struct SessionTokenClaims<'a> {
    sub: &'a str,
    uniquesessionid: &'a str,
    contact: &'a str,
    iat: i64,
    exp: i64,
}

/// A freshly minted token plus the claims a login response echoes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Contact string embedded in the token.
    pub contact: String,
    /// Session-unique id embedded in the token.
    pub session_id: String,
}

/// Issues and validates HS256 session tokens.
#[derive(Clone)]
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl std::fmt::Debug for JwtTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl JwtTokenService {
    /// Creates a service signing with `secret`; tokens live `ttl_secs`.
    ///
    /// # Errors
    ///
    /// Fails if `secret` is shorter than [`MIN_SECRET_LEN`] bytes or
    /// `ttl_secs` is zero.
    pub fn new(secret: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            bail!("jwt secret must be at least {MIN_SECRET_LEN} bytes long");
        }
        let ttl_secs = i64::try_from(ttl_secs)?;
        if ttl_secs == 0 {
            bail!("token ttl must be positive");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        })
    }

    /// Mints a token for `username` with a fresh session-unique id.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Internal`] if encoding fails.
    pub fn issue(&self, username: &str, contact: &str) -> Result<IssuedToken, ChatError> {
        self.issue_at(username, contact, chrono::Utc::now().timestamp())
    }

    fn issue_at(
        &self,
        username: &str,
        contact: &str,
        issued_at: i64,
    ) -> Result<IssuedToken, ChatError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let claims = SessionTokenClaims {
            sub: username,
            uniquesessionid: &session_id,
            contact,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ChatError::Internal(format!("failed to encode token: {e}")))?;

        Ok(IssuedToken {
            token,
            contact: contact.to_string(),
            session_id,
        })
    }
}

impl TokenValidator for JwtTokenService {
    fn validate(&self, token: &str) -> Result<(Identity, ClaimSet), ChatError> {
        let data = decode::<HashMap<String, serde_json::Value>>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| ChatError::AuthenticationFailure(e.to_string()))?;

        let mut raw = data.claims;
        let subject = match raw.remove("sub") {
            Some(serde_json::Value::String(sub)) if !sub.trim().is_empty() => sub,
            _ => {
                return Err(ChatError::AuthenticationFailure(
                    "token subject is missing or empty".to_string(),
                ));
            }
        };

        let claims: ClaimSet = raw
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::String(s) => Some((name, s)),
                _ => None,
            })
            .collect();

        if claims.get(CLAIM_SESSION_ID).is_none() || claims.get(CLAIM_CONTACT).is_none() {
            tracing::debug!(identity = %subject, "token lacks session id or contact claim");
        }

        Ok((Identity::new(subject), claims))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "chat_router_test_secret_that_is_long_enough";

    fn service() -> JwtTokenService {
        let Ok(service) = JwtTokenService::new(TEST_SECRET, 3600) else {
            panic!("service should initialize");
        };
        service
    }

    #[test]
    fn rejects_short_secret() {
        assert!(JwtTokenService::new("short", 3600).is_err());
    }

    #[test]
    fn issued_token_validates_to_identity_and_claims() {
        let service = service();
        let Ok(issued) = service.issue("alice", "alice@example.com") else {
            panic!("token should be issued");
        };
        let Ok((identity, claims)) = service.validate(&issued.token) else {
            panic!("token should validate");
        };

        assert_eq!(identity, Identity::from("alice"));
        assert_eq!(claims.contact(), Some("alice@example.com"));
        assert_eq!(claims.session_id(), Some(issued.session_id.as_str()));
    }

    #[test]
    fn each_login_gets_a_fresh_session_id() {
        let service = service();
        let (Ok(a), Ok(b)) = (service.issue("alice", "x"), service.issue("alice", "x")) else {
            panic!("tokens should be issued");
        };
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn rejects_tampered_token() {
        let service = service();
        let Ok(issued) = service.issue("alice", "x") else {
            panic!("token should be issued");
        };
        let tampered = format!("{}x", issued.token);
        assert!(matches!(
            service.validate(&tampered),
            Err(ChatError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let service = service();
        let issued_at = chrono::Utc::now().timestamp() - 3601;
        let Ok(issued) = service.issue_at("alice", "x", issued_at) else {
            panic!("token should be issued");
        };
        assert!(service.validate(&issued.token).is_err());
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let Ok(other) = JwtTokenService::new("another_secret_that_is_also_long_enough!", 60) else {
            panic!("service should initialize");
        };
        let Ok(issued) = other.issue("alice", "x") else {
            panic!("token should be issued");
        };
        assert!(service().validate(&issued.token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(service().validate("").is_err());
        assert!(service().validate("not.a.jwt").is_err());
    }

    #[test]
    fn rejects_empty_subject() {
        let service = service();
        let Ok(issued) = service.issue("  ", "x") else {
            panic!("token should be issued");
        };
        assert!(service.validate(&issued.token).is_err());
    }
}
