//! Analytics domain - logical queries, the resolver contract and new-data signals

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

const MAX_SEGMENT_LENGTH: usize = 64;

fn validate_segment(field: &str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() || value.len() > MAX_SEGMENT_LENGTH {
        return Err(DomainError::validation(format!(
            "{} must be between 1 and {} characters",
            field, MAX_SEGMENT_LENGTH
        )));
    }

    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(DomainError::validation(format!(
            "{} contains invalid character '{}'",
            field, c
        )));
    }

    Ok(())
}

/// An entity whose rows back one or more cached queries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Result<Self, DomainError> {
        let kind = kind.into();
        let id = id.into();
        validate_segment("kind", &kind)?;
        validate_segment("id", &id)?;
        Ok(Self { kind, id })
    }

    /// Prefix shared by every cached page of this entity
    ///
    /// The trailing separator keeps `pool:1` from matching `pool:10`.
    pub fn key_prefix(&self) -> String {
        format!("{}:{}:", self.kind, self.id)
    }

    /// Explicit key list used when the store cannot scan by prefix
    pub fn enumerated_keys(&self, max_pages: u32) -> Vec<String> {
        (0..max_pages)
            .map(|page| format!("{}:{}:{}", self.kind, self.id, page))
            .collect()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A read against the analytics dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    pub entity: EntityRef,
    pub page: u32,
}

impl AnalyticsQuery {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, page: u32) -> Result<Self, DomainError> {
        Ok(Self {
            entity: EntityRef::new(kind, id)?,
            page,
        })
    }

    /// `{kind}:{id}:{page}`
    pub fn cache_key(&self) -> String {
        format!("{}{}", self.entity.key_prefix(), self.page)
    }
}

/// Emitted by the indexing side whenever rows for an entity change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataSignal {
    pub entity: EntityRef,
}

/// Computes query results from the underlying dataset
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &AnalyticsQuery) -> Result<serde_json::Value, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let query = AnalyticsQuery::new("pool", "X", 2).unwrap();

        assert_eq!(query.cache_key(), "pool:X:2");
        assert_eq!(query.entity.key_prefix(), "pool:X:");
        assert!(query.cache_key().starts_with(&query.entity.key_prefix()));
    }

    #[test]
    fn test_prefix_does_not_cover_longer_ids() {
        let short = EntityRef::new("pool", "1").unwrap();
        let long = AnalyticsQuery::new("pool", "10", 0).unwrap();

        assert!(!long.cache_key().starts_with(&short.key_prefix()));
    }

    #[test]
    fn test_segment_validation() {
        assert!(EntityRef::new("pool", "0xabc_1.2-3").is_ok());
        assert!(EntityRef::new("", "1").is_err());
        assert!(EntityRef::new("pool", "a:b").is_err());
        assert!(EntityRef::new("pool", "x".repeat(65)).is_err());
    }

    #[test]
    fn test_enumerated_keys() {
        let entity = EntityRef::new("token", "eth").unwrap();

        assert_eq!(
            entity.enumerated_keys(3),
            vec!["token:eth:0", "token:eth:1", "token:eth:2"]
        );
    }
}
