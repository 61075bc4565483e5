//! Background task turning new-data signals into cache invalidations

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::analytics::{EntityRef, NewDataSignal};
use crate::infrastructure::cache::CacheLayer;

const MAX_BATCH: usize = 64;

/// Consume signals until every sender is dropped
///
/// Signals already queued are drained together so a burst of writes to one entity
/// costs a single invalidation.
pub fn spawn_invalidation_listener(
    cache: CacheLayer,
    mut signals: mpsc::Receiver<NewDataSignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Invalidation listener started");

        while let Some(first) = signals.recv().await {
            let mut batch: HashSet<EntityRef> = HashSet::from([first.entity]);

            while batch.len() < MAX_BATCH {
                match signals.try_recv() {
                    Ok(signal) => {
                        batch.insert(signal.entity);
                    }
                    Err(_) => break,
                }
            }

            debug!(entities = batch.len(), "Processing new data signals");

            for entity in batch {
                if let Err(e) = cache.invalidate_entity(&entity).await {
                    warn!(entity = %entity, error = %e, "Failed to invalidate cached entity");
                }
            }
        }

        info!("Invalidation listener stopped");
    })
}
