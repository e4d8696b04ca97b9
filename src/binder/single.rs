//! Single-Resource Binder
//!
//! Serves one cache key: cached value when fresh, otherwise a live fetch
//! that is written back to the store.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BinderState, Cacheable, ErrorCallback, FetchFn, SuccessCallback};
use crate::cache::{CacheKey, CacheStore};
use crate::error::CacheError;

// == Builder ==
/// Configures a [`CacheBinder`] before it is shared.
pub struct CacheBinderBuilder<T> {
    store: Arc<CacheStore>,
    key: CacheKey,
    fetch: FetchFn<T>,
    ttl: Option<Duration>,
    fetch_on_mount: bool,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T: Cacheable> CacheBinderBuilder<T> {
    /// TTL for values this binder writes; defaults to the key's TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Whether `activate` loads data (default true).
    pub fn fetch_on_mount(mut self, fetch_on_mount: bool) -> Self {
        self.fetch_on_mount = fetch_on_mount;
        self
    }

    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&CacheError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(super) fn on_error_arc(mut self, f: ErrorCallback) -> Self {
        self.on_error = Some(f);
        self
    }

    pub(super) fn on_success_arc(mut self, f: Option<SuccessCallback<T>>) -> Self {
        self.on_success = f;
        self
    }

    pub fn build(self) -> CacheBinder<T> {
        CacheBinder {
            inner: Arc::new(Inner {
                store: self.store,
                key: self.key,
                fetch: self.fetch,
                ttl: self.ttl,
                fetch_on_mount: self.fetch_on_mount,
                on_success: self.on_success,
                on_error: self.on_error,
                state: RwLock::new(BinderState::default()),
                alive: AtomicBool::new(true),
                mounted: AtomicBool::new(false),
                issued: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }
}

struct Inner<T> {
    store: Arc<CacheStore>,
    key: CacheKey,
    fetch: FetchFn<T>,
    ttl: Option<Duration>,
    fetch_on_mount: bool,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    state: RwLock<BinderState<T>>,
    /// Cleared by `deactivate`; resolutions after that leave state alone
    alive: AtomicBool,
    /// The mount-time load has been started
    mounted: AtomicBool,
    /// Ticket of the most recently issued live fetch
    issued: AtomicU64,
    /// Highest ticket whose resolution has been taken into account
    applied: AtomicU64,
    in_flight: AtomicUsize,
}

// == Cache Binder ==
/// Handle to one cached resource. Clones share the same state.
pub struct CacheBinder<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CacheBinder<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Cacheable> CacheBinder<T> {
    /// Starts configuring a binder for `key`, fetched by `fetch`.
    pub fn builder<F, Fut>(
        store: Arc<CacheStore>,
        key: impl Into<CacheKey>,
        fetch: F,
    ) -> CacheBinderBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        CacheBinderBuilder {
            store,
            key: key.into(),
            fetch: Arc::new(move || fetch().boxed()),
            ttl: None,
            fetch_on_mount: true,
            on_success: None,
            on_error: None,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> BinderState<T> {
        self.inner.state.read().await.clone()
    }

    pub async fn data(&self) -> Option<T> {
        self.inner.state.read().await.data.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// TTL override for values this binder writes.
    pub fn ttl(&self) -> Option<Duration> {
        self.inner.ttl
    }

    // == Activate ==
    /// Marks the binder live and, the first time only, performs the
    /// mount-time load when `fetch_on_mount` is set.
    pub async fn activate(&self) {
        self.inner.alive.store(true, Ordering::SeqCst);
        {
            // Fetches that resolved while inactive left the flag untouched
            let mut state = self.inner.state.write().await;
            state.is_loading = self.inner.in_flight.load(Ordering::SeqCst) > 0;
        }
        if self.inner.fetch_on_mount && !self.inner.mounted.swap(true, Ordering::SeqCst) {
            self.resolve(false).await;
        }
    }

    /// Tears the binder down; outstanding fetches drop their results.
    pub fn deactivate(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
    }

    /// Loads through the cache: store first, live fetch on a miss.
    pub async fn load(&self) {
        self.resolve(false).await;
    }

    // == Refresh ==
    /// Live fetch regardless of what the store holds; the result is
    /// written back to the store.
    pub async fn refresh(&self) {
        self.resolve(true).await;
    }

    // == Invalidate ==
    /// Drops the stored entry. Displayed data is untouched.
    pub fn invalidate(&self) {
        self.inner.store.invalidate(&self.inner.key);
    }

    // == Set Data ==
    /// Replaces the data locally and persists it.
    pub async fn set_data(&self, value: T) -> T {
        self.update_data(move |_| value).await
    }

    /// Computes new data from the previous value, stores it locally and
    /// persists it.
    pub async fn update_data<F>(&self, f: F) -> T
    where
        F: FnOnce(Option<T>) -> T,
    {
        let mut state = self.inner.state.write().await;
        let updated = f(state.data.take());
        state.data = Some(updated.clone());
        self.inner
            .store
            .set(&self.inner.key, &updated, self.inner.ttl);
        updated
    }

    async fn resolve(&self, force_refresh: bool) {
        let inner = &self.inner;

        if !force_refresh {
            if let Some(cached) = inner.store.get::<T>(&inner.key) {
                if !self.is_active() {
                    return;
                }
                {
                    let mut state = inner.state.write().await;
                    state.data = Some(cached.clone());
                    state.is_from_cache = true;
                    state.error = None;
                }
                if let Some(on_success) = &inner.on_success {
                    on_success(&cached);
                }
                return;
            }
        }

        let ticket = inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.is_active() {
            let mut state = inner.state.write().await;
            state.is_loading = true;
            state.error = None;
        }

        debug!(key = %inner.key, ticket, "Fetching");
        let result = (inner.fetch)().await;

        inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        // A later-issued fetch has already resolved
        let superseded = inner.applied.fetch_max(ticket, Ordering::SeqCst) > ticket;

        if superseded {
            debug!(key = %inner.key, ticket, "Dropping superseded fetch result");
        } else if let Ok(data) = &result {
            inner.store.set(&inner.key, data, inner.ttl);
        }

        if !self.is_active() {
            debug!(key = %inner.key, "Binder deactivated, dropping fetch result");
            return;
        }

        let mut state = inner.state.write().await;
        state.is_loading = inner.in_flight.load(Ordering::SeqCst) > 0;
        if superseded {
            return;
        }

        match result {
            Ok(data) => {
                state.data = Some(data.clone());
                state.is_from_cache = false;
                state.error = None;
                drop(state);
                if let Some(on_success) = &inner.on_success {
                    on_success(&data);
                }
            }
            Err(err) => {
                let error = CacheError::fetch(&err);
                state.error = Some(error.clone());
                drop(state);
                if let Some(on_error) = &inner.on_error {
                    on_error(&error);
                }
            }
        }
    }
}
