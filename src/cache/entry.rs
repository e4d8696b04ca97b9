//! Cache Entry Module
//!
//! Defines the persisted envelope wrapping every cached value.

use serde::{Deserialize, Serialize};

// == Stored Entry ==
/// The envelope written to the medium for each key.
///
/// Serialized as `{"data": .., "cachedAt": .., "ttl": .., "schemaVersion": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry<T> {
    /// The cached payload
    pub data: T,
    /// Write timestamp (Unix milliseconds)
    pub cached_at: i64,
    /// Validity window in milliseconds
    pub ttl: u64,
    /// Envelope version at write time
    #[serde(default)]
    pub schema_version: u32,
}

impl<T> StoredEntry<T> {
    // == Constructor ==
    pub fn new(data: T, cached_at: i64, ttl: u64, schema_version: u32) -> Self {
        Self {
            data,
            cached_at,
            ttl,
            schema_version,
        }
    }

    // == Is Fresh ==
    /// An entry is fresh while `now - cached_at < ttl`.
    ///
    /// Boundary condition: at exactly `cached_at + ttl` the entry is stale.
    /// A timestamp in the future (clock skew) counts as age zero.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        let age = u64::try_from(now_ms.saturating_sub(self.cached_at)).unwrap_or(0);
        age < self.ttl
    }
}
