//! Cache Statistics Module
//!
//! Tracks store counters (hits, misses, evictions, write failures) and the
//! current footprint of the namespace in the medium.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache counters and contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of fresh reads
    pub hits: u64,
    /// Number of reads that found nothing usable
    pub misses: u64,
    /// Number of entries removed as stale, corrupt, or to free space
    pub evictions: u64,
    /// Number of writes the medium rejected (including retries)
    pub write_failures: u64,
    /// hits / (hits + misses) at snapshot time
    pub hit_rate: f64,
    /// Current number of entries in the namespace
    pub entries: usize,
    /// Bytes held by the namespace's serialized entries
    pub total_bytes: usize,
    /// Keys in the namespace, without the namespace prefix
    pub keys: Vec<String>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }
}
