//! Authentication: bearer token issuance and validation.
//!
//! The WebSocket layer only depends on the [`TokenValidator`] trait;
//! [`JwtTokenService`] is the HS256 implementation wired in by `main`.

pub mod jwt;
pub mod token;

pub use jwt::{IssuedToken, JwtTokenService};
pub use token::{ClaimSet, TokenValidator};
