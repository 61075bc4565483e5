//! Domain layer - Core business logic and entities

pub mod analytics;
pub mod cache;
pub mod client;
pub mod error;
pub mod gateway;
pub mod quota;
pub mod token;

pub use analytics::{AnalyticsQuery, EntityRef, NewDataSignal, Resolver};
pub use cache::CacheStore;
pub use client::{
    ClientId, ClientIdentity, ClientRepository, ClientStatus, ClientValidationError, InvalidTier,
    Role, Tier,
};
pub use error::DomainError;
pub use gateway::{GatewayError, RoutePolicy};
pub use quota::{QuotaDecision, QuotaStatus, QuotaWindow};
pub use token::{RefreshedAccessToken, TokenClaims, TokenError, TokenPair, TokenType};
