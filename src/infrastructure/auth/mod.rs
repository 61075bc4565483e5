//! Token signing infrastructure
//!
//! RS256 access/refresh tokens signed with a key loaded from a JWKS document or
//! generated at startup.

mod jwt;
mod keys;

pub use jwt::{JwksTokenService, TokenConfig, TokenService};
pub use keys::{Jwk, JwkSet, RsaSigningKey};

#[cfg(test)]
pub(crate) use keys::test_support;
