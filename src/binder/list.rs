//! List Binder
//!
//! A `CacheBinder<Vec<T>>` with create/update/remove helpers. Each helper
//! calls the remote mutation first and patches the cached list only once it
//! succeeds, so no full re-fetch is needed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use super::{BinderState, CacheBinder, CacheBinderBuilder, Cacheable, SuccessCallback};
use crate::cache::{CacheKey, CacheStore};
use crate::error::{CacheError, Operation};

/// Something carrying a string identity.
pub trait Keyed {
    fn id(&self) -> &str;
}

/// A list element.
///
/// `Draft` is what `create` sends (no server-assigned fields yet); `Patch`
/// is what `update` sends and must name the record it changes.
pub trait Record: Keyed + Cacheable {
    type Draft: Send + 'static;
    type Patch: Keyed + Send + 'static;
}

type CreateFn<T> =
    Arc<dyn Fn(<T as Record>::Draft) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type UpdateFn<T> =
    Arc<dyn Fn(<T as Record>::Patch) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type DeleteFn = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type ListErrorCallback = Arc<dyn Fn(&CacheError, Operation) + Send + Sync>;

// == Builder ==
/// Configures a [`CachedListBinder`].
pub struct CachedListBinderBuilder<T: Record> {
    inner: CacheBinderBuilder<Vec<T>>,
    create_fn: Option<CreateFn<T>>,
    update_fn: Option<UpdateFn<T>>,
    delete_fn: Option<DeleteFn>,
    on_success: Option<SuccessCallback<Vec<T>>>,
    on_error: Option<ListErrorCallback>,
}

impl<T: Record> CachedListBinderBuilder<T> {
    pub fn create_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T::Draft) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.create_fn = Some(Arc::new(move |draft| f(draft).boxed()));
        self
    }

    pub fn update_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T::Patch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.update_fn = Some(Arc::new(move |patch| f(patch).boxed()));
        self
    }

    pub fn delete_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.delete_fn = Some(Arc::new(move |id| f(id).boxed()));
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.inner = self.inner.ttl(ttl);
        self
    }

    pub fn fetch_on_mount(mut self, fetch_on_mount: bool) -> Self {
        self.inner = self.inner.fetch_on_mount(fetch_on_mount);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&Vec<T>) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Observer for failures of any operation, tagged with which one.
    pub fn on_error(mut self, f: impl Fn(&CacheError, Operation) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> CachedListBinder<T> {
        let mut inner = self.inner.on_success_arc(self.on_success);
        if let Some(on_error) = &self.on_error {
            let on_error = Arc::clone(on_error);
            inner = inner.on_error_arc(Arc::new(move |err| on_error(err, Operation::Fetch)));
        }

        CachedListBinder {
            binder: inner.build(),
            create_fn: self.create_fn,
            update_fn: self.update_fn,
            delete_fn: self.delete_fn,
            on_error: self.on_error,
        }
    }
}

// == Cached List Binder ==
/// Binder over a cached `Vec<T>` with record-level mutations.
pub struct CachedListBinder<T: Record> {
    binder: CacheBinder<Vec<T>>,
    create_fn: Option<CreateFn<T>>,
    update_fn: Option<UpdateFn<T>>,
    delete_fn: Option<DeleteFn>,
    on_error: Option<ListErrorCallback>,
}

impl<T: Record> Clone for CachedListBinder<T> {
    fn clone(&self) -> Self {
        Self {
            binder: self.binder.clone(),
            create_fn: self.create_fn.clone(),
            update_fn: self.update_fn.clone(),
            delete_fn: self.delete_fn.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T: Record> CachedListBinder<T> {
    pub fn builder<F, Fut>(
        store: Arc<CacheStore>,
        key: impl Into<CacheKey>,
        fetch: F,
    ) -> CachedListBinderBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
    {
        CachedListBinderBuilder {
            inner: CacheBinder::builder(store, key, fetch),
            create_fn: None,
            update_fn: None,
            delete_fn: None,
            on_success: None,
            on_error: None,
        }
    }

    /// The underlying single-resource binder.
    pub fn binder(&self) -> &CacheBinder<Vec<T>> {
        &self.binder
    }

    pub fn key(&self) -> &CacheKey {
        self.binder.key()
    }

    pub async fn state(&self) -> BinderState<Vec<T>> {
        self.binder.state().await
    }

    pub async fn data(&self) -> Option<Vec<T>> {
        self.binder.data().await
    }

    pub async fn activate(&self) {
        self.binder.activate().await;
    }

    pub fn deactivate(&self) {
        self.binder.deactivate();
    }

    pub async fn load(&self) {
        self.binder.load().await;
    }

    pub async fn refresh(&self) {
        self.binder.refresh().await;
    }

    pub fn invalidate(&self) {
        self.binder.invalidate();
    }

    pub async fn set_data(&self, items: Vec<T>) -> Vec<T> {
        self.binder.set_data(items).await
    }

    pub async fn update_data<F>(&self, f: F) -> Vec<T>
    where
        F: FnOnce(Option<Vec<T>>) -> Vec<T>,
    {
        self.binder.update_data(f).await
    }

    // == Create ==
    /// Creates a record remotely and prepends the server's version of it.
    ///
    /// Returns `None` on failure or when no create function was supplied.
    pub async fn create(&self, draft: T::Draft) -> Option<T> {
        let Some(create_fn) = &self.create_fn else {
            warn!(key = %self.key(), "Create function not provided");
            return None;
        };

        match create_fn(draft).await {
            Ok(created) => {
                let record = created.clone();
                self.apply(move |prev| {
                    let mut items = vec![record];
                    items.extend(prev.unwrap_or_default());
                    items
                })
                .await;
                Some(created)
            }
            Err(err) => {
                self.report(CacheError::mutation(Operation::Create, &err));
                None
            }
        }
    }

    // == Update ==
    /// Updates a record remotely and swaps in the returned record, keeping
    /// its position.
    pub async fn update(&self, patch: T::Patch) -> Option<T> {
        let Some(update_fn) = &self.update_fn else {
            warn!(key = %self.key(), "Update function not provided");
            return None;
        };

        let id = patch.id().to_string();
        match update_fn(patch).await {
            Ok(updated) => {
                let record = updated.clone();
                self.apply(move |prev| match prev {
                    Some(items) => items
                        .into_iter()
                        .map(|item| if item.id() == id { record.clone() } else { item })
                        .collect(),
                    None => vec![record],
                })
                .await;
                Some(updated)
            }
            Err(err) => {
                self.report(CacheError::mutation(Operation::Update, &err));
                None
            }
        }
    }

    // == Remove ==
    /// Deletes a record remotely and filters it out of the list.
    pub async fn remove(&self, id: &str) -> bool {
        let Some(delete_fn) = &self.delete_fn else {
            warn!(key = %self.key(), "Delete function not provided");
            return false;
        };

        match delete_fn(id.to_string()).await {
            Ok(()) => {
                self.apply(|prev| {
                    prev.unwrap_or_default()
                        .into_iter()
                        .filter(|item| item.id() != id)
                        .collect()
                })
                .await;
                true
            }
            Err(err) => {
                self.report(CacheError::mutation(Operation::Delete, &err));
                false
            }
        }
    }

    /// Patches the list after a confirmed mutation.
    ///
    /// Once deactivated, binder state is left alone and only a list already
    /// in the store is patched.
    async fn apply<F>(&self, f: F)
    where
        F: FnOnce(Option<Vec<T>>) -> Vec<T>,
    {
        if self.binder.is_active() {
            self.binder.update_data(f).await;
            return;
        }

        debug!(key = %self.key(), "Binder deactivated, patching stored list only");
        let store = self.binder.store();
        if let Some(items) = store.get::<Vec<T>>(self.key()) {
            store.set(self.key(), &f(Some(items)), self.binder.ttl());
        }
    }

    fn report(&self, error: CacheError) {
        if !self.binder.is_active() {
            debug!(key = %self.key(), error = %error, "Binder deactivated, dropping mutation error");
            return;
        }
        warn!(key = %self.key(), operation = %error.operation(), error = %error, "List mutation failed");
        if let Some(on_error) = &self.on_error {
            on_error(&error, error.operation());
        }
    }
}
