//! Gateway domain - per-route policy and request rejection reasons

use thiserror::Error;

use crate::domain::client::Role;
use crate::domain::token::TokenError;
use crate::domain::DomainError;

/// Access policy of a gated route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    required_role: Option<Role>,
    public: bool,
}

impl RoutePolicy {
    /// No token, no quota
    pub const fn public() -> Self {
        Self {
            required_role: None,
            public: true,
        }
    }

    /// Any valid access token
    pub const fn authenticated() -> Self {
        Self {
            required_role: None,
            public: false,
        }
    }

    pub const fn requires(role: Role) -> Self {
        Self {
            required_role: Some(role),
            public: false,
        }
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }
}

/// Reasons a gated request is rejected
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Role '{required}' is required for this operation")]
    InsufficientPermissions { required: Role },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Shares its external message with a wrong credential
    #[error("Invalid credentials")]
    UnknownCredential,

    #[error(transparent)]
    Upstream(#[from] DomainError),
}

impl GatewayError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::InsufficientPermissions { .. } => "insufficient_permissions",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::UnknownCredential => "invalid_credentials",
            Self::Upstream(_) => "upstream_error",
        }
    }
}

impl From<TokenError> for GatewayError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            other => Self::InvalidToken(other.to_string()),
        }
    }
}
