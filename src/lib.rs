//! Portal Cache - a typed client-side read-through cache
//!
//! Provides TTL-aware storage over a pluggable key-value medium and binders
//! that couple a cache key to remote fetch and mutation functions.

pub mod binder;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use binder::{BinderState, CacheBinder, CachedListBinder, Keyed, Record};
pub use cache::{CacheKey, CacheStore, FileMedium, KvMedium, MemoryMedium, ResourceKind};
pub use config::Config;
pub use error::{CacheError, MediumError, Operation};
pub use tasks::spawn_sweep_task;
