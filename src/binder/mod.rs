//! Binder Module
//!
//! Couples a cache key and remote functions to a consumer-facing state
//! snapshot plus operations.
//!
//! # Binders
//! - `CacheBinder`: one resource, read-through with refresh/invalidate/local update
//! - `CachedListBinder`: a list of records with create/update/remove

mod list;
mod single;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;

pub use list::{CachedListBinder, CachedListBinderBuilder, Keyed, Record};
pub use single::{CacheBinder, CacheBinderBuilder};

/// Values a binder can hold: persisted as JSON and shared with observers.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Remote retrieval of a binder's value.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Observer called whenever fresh data becomes available.
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Observer called when the fetch function fails.
pub type ErrorCallback = Arc<dyn Fn(&CacheError) + Send + Sync>;

// == Binder State ==
/// Snapshot of what a binder currently exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct BinderState<T> {
    /// Last value obtained from the store, a fetch, or a local update
    pub data: Option<T>,
    /// A live fetch is outstanding
    pub is_loading: bool,
    /// Error of the most recent failed fetch, cleared on the next success
    pub error: Option<CacheError>,
    /// `data` was served by the store rather than a live fetch
    pub is_from_cache: bool,
}

impl<T> Default for BinderState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            is_from_cache: false,
        }
    }
}
