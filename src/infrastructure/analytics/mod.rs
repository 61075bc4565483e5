//! Analytics dataset, resolver and invalidation wiring

mod dataset;
mod invalidation;

pub use dataset::{Dataset, DatasetWriter, InMemoryDatasetResolver, DEFAULT_PAGE_SIZE};
pub use invalidation::spawn_invalidation_listener;
