//! Expired-Entry Sweep Task
//!
//! Background task that periodically removes expired cache entries, so
//! entries nobody reads again do not linger in the medium.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that sweeps expired entries from `store`.
///
/// The first sweep runs after `initial_delay`, so it stays out of the way
/// of start-up work; later sweeps run every `interval`.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(CacheStore::new(Arc::new(MemoryMedium::new())));
/// let handle = spawn_sweep_task(store.clone(), Duration::from_secs(5), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task(
    store: Arc<CacheStore>,
    initial_delay: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting expired-entry sweep: first in {:?}, then every {:?}",
            initial_delay, interval
        );

        tokio::time::sleep(initial_delay).await;

        loop {
            let removed = store.clear_expired();

            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }

            tokio::time::sleep(interval).await;
        }
    })
}
