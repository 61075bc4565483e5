//! In-process dataset standing in for the indexing pipeline
//!
//! `DatasetWriter` appends rows and emits a `NewDataSignal` per write;
//! `InMemoryDatasetResolver` serves paged reads over the same rows.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::domain::analytics::{AnalyticsQuery, EntityRef, NewDataSignal, Resolver};
use crate::domain::DomainError;

pub const DEFAULT_PAGE_SIZE: usize = 50;

type Rows = Arc<RwLock<HashMap<EntityRef, Vec<Value>>>>;

/// Shared row storage
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Rows,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self, entity: &EntityRef) -> usize {
        self.rows.read().await.get(entity).map_or(0, Vec::len)
    }
}

/// Resolver serving pages of rows from a [`Dataset`]
#[derive(Debug, Clone)]
pub struct InMemoryDatasetResolver {
    dataset: Dataset,
    page_size: usize,
}

impl InMemoryDatasetResolver {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl Resolver for InMemoryDatasetResolver {
    async fn resolve(&self, query: &AnalyticsQuery) -> Result<Value, DomainError> {
        let rows = self.dataset.rows.read().await;
        let all = rows.get(&query.entity).map(Vec::as_slice).unwrap_or_default();

        let page: Vec<&Value> = all
            .iter()
            .skip(query.page as usize * self.page_size)
            .take(self.page_size)
            .collect();

        debug!(entity = %query.entity, page = query.page, rows = page.len(), "Resolved query");

        Ok(json!({
            "kind": query.entity.kind,
            "id": query.entity.id,
            "page": query.page,
            "page_size": self.page_size,
            "total_rows": all.len(),
            "rows": page,
        }))
    }
}

/// Appends rows and announces them to the invalidation listener
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    dataset: Dataset,
    signals: mpsc::Sender<NewDataSignal>,
}

impl DatasetWriter {
    pub fn new(dataset: Dataset, signals: mpsc::Sender<NewDataSignal>) -> Self {
        Self { dataset, signals }
    }

    /// Append a row, returning the entity's new row count
    ///
    /// The row is kept even if no listener is running; cached pages then expire
    /// by TTL only.
    pub async fn append(&self, entity: EntityRef, row: Value) -> Result<usize, DomainError> {
        if !row.is_object() {
            return Err(DomainError::validation("Row must be a JSON object"));
        }

        let count = {
            let mut rows = self.dataset.rows.write().await;
            let entry = rows.entry(entity.clone()).or_default();
            entry.push(row);
            entry.len()
        };

        if self
            .signals
            .send(NewDataSignal {
                entity: entity.clone(),
            })
            .await
            .is_err()
        {
            warn!(entity = %entity, "Invalidation listener is gone, new data signal dropped");
        }

        Ok(count)
    }
}
