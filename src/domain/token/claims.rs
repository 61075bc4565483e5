//! Token claims and issued token shapes

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::client::{ClientId, ClientIdentity, ClientValidationError, Role, Tier};

/// Kind of a signed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims carried by access and refresh tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (client ID)
    pub sub: String,
    /// Effective roles at issue time
    pub roles: BTreeSet<Role>,
    /// Requests allowed per quota window
    pub quota: u32,
    pub tier: Tier,
    pub typ: TokenType,
    pub iss: String,
    /// Unique token ID
    pub jti: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
}

impl TokenClaims {
    /// Snapshot an identity into claims
    ///
    /// Roles and quota are the identity's effective values, so a suspended client
    /// receives quota 0 and no privileged roles.
    pub fn for_identity(
        identity: &ClientIdentity,
        typ: TokenType,
        issuer: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: identity.id().as_str().to_string(),
            roles: identity.effective_roles(),
            quota: identity.effective_quota(),
            tier: identity.tier(),
            typ,
            iss: issuer.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Fresh access claims with the same subject, roles, quota and tier
    pub fn renewed_access(&self, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            typ: TokenType::Access,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            ..self.clone()
        }
    }

    pub fn client_id(&self) -> Result<ClientId, ClientValidationError> {
        ClientId::new(self.sub.clone())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }

    /// Seconds until expiry, never negative
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }
}

/// Result of a credential exchange
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
    #[serde(skip)]
    pub access_claims: TokenClaims,
}

/// Result of a refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedAccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip)]
    pub claims: TokenClaims,
}
