//! Cache Module
//!
//! Provides TTL-aware typed storage over a pluggable key-value medium.

mod clock;
mod entry;
mod key;
mod medium;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::StoredEntry;
pub use key::{CacheKey, ResourceKind};
pub use medium::{FileMedium, KvMedium, MemoryMedium};
pub use stats::CacheStats;
pub use store::{CacheStore, FetchOptions};
