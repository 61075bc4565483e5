//! Token domain - claims, token shapes and verification errors

mod claims;
mod error;

pub use claims::{RefreshedAccessToken, TokenClaims, TokenPair, TokenType};
pub use error::TokenError;
