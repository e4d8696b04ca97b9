//! Cache Store Module
//!
//! TTL-aware typed storage on top of a raw `KvMedium`. The store is
//! best-effort: every medium failure is logged and degrades to a miss.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheStats, Clock, KvMedium, ResourceKind, StoredEntry, SystemClock};
use crate::config::Config;
use crate::error::MediumError;

// == Decoded ==
/// Outcome of reading one raw envelope.
enum Decoded<T> {
    Fresh(T),
    Stale,
    /// Valid envelope whose payload is not a `T`
    Mismatch(String),
    Corrupt(String),
}

// == Fetch Options ==
/// Options for [`CacheStore::with_cache`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// TTL for the stored result, None = key default
    pub ttl: Option<Duration>,
    /// Skip the cache read and always call the fetch function
    pub force_refresh: bool,
}

// == Cache Store ==
/// Typed, TTL-aware store isolated under a key namespace.
pub struct CacheStore {
    /// Raw backend
    medium: Arc<dyn KvMedium>,
    /// Time source for `cachedAt` and freshness
    clock: Arc<dyn Clock>,
    /// Prefix of every medium key this store owns
    namespace: String,
    /// TTL for keys that are not a well-known resource
    default_ttl: Duration,
    /// Envelope version written and accepted
    schema_version: u32,
    /// Counters
    stats: Mutex<CacheStats>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("namespace", &self.namespace)
            .field("default_ttl", &self.default_ttl)
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store over `medium` with the default configuration.
    pub fn new(medium: Arc<dyn KvMedium>) -> Self {
        Self::from_config(medium, &Config::default())
    }

    /// Creates a store over `medium` using namespace, TTL and schema
    /// version from `config`.
    pub fn from_config(medium: Arc<dyn KvMedium>, config: &Config) -> Self {
        Self {
            medium,
            clock: Arc::new(SystemClock),
            namespace: config.namespace.clone(),
            default_ttl: config.default_ttl(),
            schema_version: config.schema_version,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Current time according to the store's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// TTL used by `set` when the caller gives none.
    pub fn default_ttl_for(&self, key: &str) -> Duration {
        ResourceKind::from_key(key)
            .map(|kind| kind.default_ttl())
            .unwrap_or(self.default_ttl)
    }

    // == Get ==
    /// Returns the cached value if present, decodable and fresh.
    ///
    /// Stale, corrupt, or version-mismatched entries are removed as a side
    /// effect and reported as a miss. An entry whose payload is not a `T`
    /// is a miss but stays in place for readers of the right type.
    pub fn get<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Option<T> {
        let key = key.as_ref();
        let full_key = self.full_key(key);

        let raw = match self.medium.read_raw(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Cache miss");
                self.with_stats(|s| s.record_miss());
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, "Cache read error");
                self.with_stats(|s| s.record_miss());
                return None;
            }
        };

        match self.decode::<T>(&raw) {
            Decoded::Fresh(data) => {
                debug!(key, "Cache hit");
                self.with_stats(|s| s.record_hit());
                Some(data)
            }
            Decoded::Stale => {
                debug!(key, "Cache entry expired");
                self.evict(&full_key);
                self.with_stats(|s| s.record_miss());
                None
            }
            Decoded::Mismatch(reason) => {
                debug!(key, reason = %reason, "Cache entry has a different shape");
                self.with_stats(|s| s.record_miss());
                None
            }
            Decoded::Corrupt(reason) => {
                warn!(key, reason = %reason, "Discarding corrupt cache entry");
                self.evict(&full_key);
                self.with_stats(|s| s.record_miss());
                None
            }
        }
    }

    // == Set ==
    /// Stores `data` under `key` with `cachedAt = now`.
    ///
    /// A rejected write triggers one recovery pass (sweep expired entries,
    /// and on quota errors evict the oldest entry if the sweep freed
    /// nothing) followed by a single retry. A second failure is swallowed.
    pub fn set<T: Serialize>(&self, key: impl AsRef<str>, data: &T, ttl: Option<Duration>) {
        let key = key.as_ref();
        let ttl = ttl.unwrap_or_else(|| self.default_ttl_for(key));
        let entry = StoredEntry::new(
            data,
            self.clock.now_ms(),
            u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            self.schema_version,
        );

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "Cache serialization error");
                return;
            }
        };

        let full_key = self.full_key(key);
        let err = match self.medium.write_raw(&full_key, &raw) {
            Ok(()) => {
                debug!(key, ttl_ms = entry.ttl, "Cache write");
                return;
            }
            Err(err) => err,
        };

        warn!(key, error = %err, "Cache write error, attempting recovery");
        self.with_stats(|s| s.record_write_failure());
        self.recover_space(&full_key, &err);

        if let Err(err) = self.medium.write_raw(&full_key, &raw) {
            self.with_stats(|s| s.record_write_failure());
            warn!(key, error = %err, "Cache write failed after recovery, giving up");
        }
    }

    // == Invalidate ==
    /// Removes the entry for `key`. Absent keys are fine.
    pub fn invalidate(&self, key: impl AsRef<str>) {
        let key = key.as_ref();
        if let Err(err) = self.medium.remove_raw(&self.full_key(key)) {
            warn!(key, error = %err, "Cache invalidation error");
        }
    }

    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let full_prefix = self.full_key(prefix);
        let mut removed = 0;
        for full_key in self.namespaced_keys() {
            if !full_key.starts_with(&full_prefix) {
                continue;
            }
            match self.medium.remove_raw(&full_key) {
                Ok(()) => removed += 1,
                Err(err) => warn!(key = %full_key, error = %err, "Cache prefix invalidation error"),
            }
        }
        debug!(prefix, removed, "Invalidated cache prefix");
        removed
    }

    // == Cleanup Expired ==
    /// Removes every stale or corrupt entry in the namespace.
    ///
    /// Returns the number of entries removed.
    pub fn clear_expired(&self) -> usize {
        let mut removed = 0;
        for full_key in self.namespaced_keys() {
            let raw = match self.medium.read_raw(&full_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(err) => {
                    debug!(key = %full_key, error = %err, "Skipping unreadable entry during sweep");
                    continue;
                }
            };
            if matches!(self.decode::<IgnoredAny>(&raw), Decoded::Fresh(_)) {
                continue;
            }
            if self.evict(&full_key) {
                removed += 1;
            }
        }
        removed
    }

    /// Removes every entry in the namespace.
    ///
    /// Returns the number of entries removed.
    pub fn clear_all(&self) -> usize {
        let mut removed = 0;
        for full_key in self.namespaced_keys() {
            match self.medium.remove_raw(&full_key) {
                Ok(()) => removed += 1,
                Err(err) => warn!(key = %full_key, error = %err, "Cache clear error"),
            }
        }
        removed
    }

    // == Stats ==
    /// Returns counters plus the namespace's current contents.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for full_key in self.namespaced_keys() {
            if let Ok(Some(raw)) = self.medium.read_raw(&full_key) {
                stats.total_bytes += raw.len();
            }
            stats.keys.push(full_key[self.namespace.len()..].to_string());
        }
        stats.entries = stats.keys.len();
        stats.hit_rate = stats.hit_rate();
        stats
    }

    // == With Cache ==
    /// Read-through helper: returns a fresh cached value for `key`, or
    /// awaits `fetch`, stores its result, and returns it.
    ///
    /// Fetch errors are returned unchanged; nothing is stored for them.
    pub async fn with_cache<T, F, Fut>(
        &self,
        key: impl AsRef<str>,
        fetch: F,
        options: FetchOptions,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let key = key.as_ref();
        if !options.force_refresh {
            if let Some(cached) = self.get::<T>(key) {
                return Ok(cached);
            }
        }

        let data = fetch().await?;
        self.set(key, &data, options.ttl);
        Ok(data)
    }

    // == Internals ==
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn with_stats(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Decoded<T> {
        let entry: StoredEntry<serde_json::Value> = match serde_json::from_str(raw) {
            Ok(entry) => entry,
            Err(err) => return Decoded::Corrupt(err.to_string()),
        };

        if entry.schema_version != self.schema_version {
            return Decoded::Corrupt(format!(
                "schema version {} does not match {}",
                entry.schema_version, self.schema_version
            ));
        }

        if !entry.is_fresh(self.clock.now_ms()) {
            return Decoded::Stale;
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => Decoded::Fresh(data),
            Err(err) => Decoded::Mismatch(err.to_string()),
        }
    }

    /// Medium keys inside this store's namespace; empty on listing failure.
    fn namespaced_keys(&self) -> Vec<String> {
        match self.medium.list_keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.namespace))
                .collect(),
            Err(err) => {
                warn!(error = %err, "Cache key listing error");
                Vec::new()
            }
        }
    }

    fn evict(&self, full_key: &str) -> bool {
        match self.medium.remove_raw(full_key) {
            Ok(()) => {
                self.with_stats(|s| s.record_eviction());
                true
            }
            Err(err) => {
                debug!(key = %full_key, error = %err, "Best-effort eviction failed");
                false
            }
        }
    }

    fn recover_space(&self, protected: &str, err: &MediumError) {
        let swept = self.clear_expired();
        if swept > 0 {
            debug!(swept, "Swept expired entries before retrying write");
            return;
        }
        if !matches!(err, MediumError::QuotaExceeded { .. }) {
            return;
        }
        if let Some(oldest) = self.oldest_key(protected) {
            debug!(key = %oldest, "Evicting oldest entry to free space");
            self.evict(&oldest);
        }
    }

    /// The namespaced key with the smallest `cachedAt`, other than `protected`.
    fn oldest_key(&self, protected: &str) -> Option<String> {
        self.namespaced_keys()
            .into_iter()
            .filter(|k| k != protected)
            .filter_map(|k| {
                let raw = self.medium.read_raw(&k).ok()??;
                let entry: StoredEntry<IgnoredAny> = serde_json::from_str(&raw).ok()?;
                Some((entry.cached_at, k))
            })
            .min_by_key(|(cached_at, _)| *cached_at)
            .map(|(_, k)| k)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryMedium};
    use serde_json::json;

    fn store_with_clock() -> (CacheStore, Arc<MemoryMedium>, Arc<ManualClock>) {
        let medium = Arc::new(MemoryMedium::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = CacheStore::new(medium.clone()).with_clock(clock.clone());
        (store, medium, clock)
    }

    #[test]
    fn test_store_set_and_get() {
        let (store, _, _) = store_with_clock();

        store.set("key1", &vec![1, 2, 3], None);
        let value: Option<Vec<i32>> = store.get("key1");

        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (store, _, _) = store_with_clock();
        assert_eq!(store.get::<String>("nonexistent"), None);
    }

    #[test]
    fn test_store_writes_namespaced_envelope() {
        let (store, medium, _) = store_with_clock();

        store.set("news:list", &json!([{"id": "1"}]), Some(Duration::from_millis(2000)));

        let raw = medium.read_raw("portal_cache_news:list").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["data"], json!([{"id": "1"}]));
        assert_eq!(value["cachedAt"], json!(1_000_000));
        assert_eq!(value["ttl"], json!(2000));
        assert_eq!(value["schemaVersion"], json!(1));
    }

    #[test]
    fn test_store_ttl_expiration_removes_entry() {
        let (store, medium, clock) = store_with_clock();

        store.set("key1", &"value1", Some(Duration::from_millis(1000)));

        clock.advance(Duration::from_millis(999));
        assert_eq!(store.get::<String>("key1"), Some("value1".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get::<String>("key1"), None);
        assert!(medium.is_empty(), "Stale entry should be removed on read");
    }

    #[test]
    fn test_store_default_ttl_by_resource() {
        let (store, _, clock) = store_with_clock();

        // Announcements: 5 minutes; newsletters: 1 hour
        store.set(ResourceKind::Announcements.as_str(), &1, None);
        store.set(ResourceKind::Newsletters.as_str(), &2, None);
        store.set("custom", &3, None);

        clock.advance(Duration::from_secs(10 * 60));
        assert_eq!(store.get::<i32>("announcements"), None);
        assert_eq!(store.get::<i32>("custom"), None);
        assert_eq!(store.get::<i32>("newsletters"), Some(2));
    }

    #[test]
    fn test_store_corrupt_entry_is_miss_and_removed() {
        let (store, medium, _) = store_with_clock();
        medium.write_raw("portal_cache_bad", "{not json").unwrap();

        assert_eq!(store.get::<i32>("bad"), None);
        assert_eq!(medium.read_raw("portal_cache_bad").unwrap(), None);
    }

    #[test]
    fn test_store_shape_mismatch_is_miss_and_kept() {
        let (store, medium, _) = store_with_clock();
        store.set("k", &"text", None);

        assert_eq!(store.get::<Vec<i32>>("k"), None);
        assert_eq!(medium.len(), 1);
        assert_eq!(store.get::<String>("k").as_deref(), Some("text"));
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_huge_ttl_does_not_wrap() {
        let (store, _, clock) = store_with_clock();
        store.set("k", &1, Some(Duration::MAX));

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(store.get::<i32>("k"), Some(1));
    }

    #[test]
    fn test_store_schema_mismatch_is_evicted() {
        let medium = Arc::new(MemoryMedium::new());
        let old = CacheStore::from_config(
            medium.clone(),
            &Config {
                schema_version: 1,
                ..Config::default()
            },
        );
        let new = CacheStore::from_config(
            medium.clone(),
            &Config {
                schema_version: 2,
                ..Config::default()
            },
        );

        old.set("members", &vec!["a"], None);
        assert_eq!(new.get::<Vec<String>>("members"), None);
        assert!(medium.is_empty());
    }

    #[test]
    fn test_store_invalidate() {
        let (store, _, _) = store_with_clock();

        store.set("key1", &1, None);
        store.invalidate("key1");
        store.invalidate("never-existed");

        assert_eq!(store.get::<i32>("key1"), None);
    }

    #[test]
    fn test_store_invalidate_by_prefix() {
        let (store, medium, _) = store_with_clock();
        medium.write_raw("unrelated_news:1", "keep").unwrap();

        store.set("news:1", &1, None);
        store.set("news:2", &2, None);
        store.set("members", &3, None);

        assert_eq!(store.invalidate_by_prefix("news:"), 2);
        assert_eq!(store.get::<i32>("news:1"), None);
        assert_eq!(store.get::<i32>("members"), Some(3));
        assert_eq!(medium.read_raw("unrelated_news:1").unwrap(), Some("keep".to_string()));
    }

    #[test]
    fn test_store_clear_expired() {
        let (store, medium, clock) = store_with_clock();
        medium.write_raw("portal_cache_junk", "???").unwrap();
        medium.write_raw("other_app", "???").unwrap();

        store.set("short", &1, Some(Duration::from_millis(100)));
        store.set("long", &2, Some(Duration::from_millis(10_000)));
        clock.advance(Duration::from_millis(500));

        assert_eq!(store.clear_expired(), 2);
        assert_eq!(store.get::<i32>("long"), Some(2));
        assert_eq!(medium.read_raw("other_app").unwrap(), Some("???".to_string()));
    }

    #[test]
    fn test_store_clear_all_respects_namespace() {
        let (store, medium, _) = store_with_clock();
        medium.write_raw("portal_session", "keep").unwrap();
        store.set("a", &1, None);
        store.set("b", &2, None);

        assert_eq!(store.clear_all(), 2);
        assert_eq!(medium.list_keys().unwrap(), vec!["portal_session"]);
    }

    #[test]
    fn test_store_stats() {
        let (store, _, _) = store_with_clock();

        store.set("key1", &"value1", None);
        store.get::<String>("key1"); // hit
        store.get::<String>("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.keys, vec!["key1"]);
        assert!(stats.total_bytes > 0);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_store_quota_evicts_oldest_and_retries() {
        let medium = Arc::new(MemoryMedium::with_quota(300));
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::new(medium.clone()).with_clock(clock.clone());

        let payload = "x".repeat(60);
        store.set("first", &payload, None);
        clock.advance(Duration::from_millis(10));
        store.set("second", &payload, None);
        clock.advance(Duration::from_millis(10));

        // Does not fit next to both; the oldest ("first") gives way
        store.set("third", &payload, None);

        assert_eq!(store.get::<String>("first"), None);
        assert_eq!(store.get::<String>("second"), Some(payload.clone()));
        assert_eq!(store.get::<String>("third"), Some(payload));

        let stats = store.stats();
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_store_quota_prefers_sweeping_expired() {
        let medium = Arc::new(MemoryMedium::with_quota(300));
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::new(medium.clone()).with_clock(clock.clone());

        let payload = "x".repeat(60);
        store.set("fresh", &payload, Some(Duration::from_secs(60)));
        store.set("expiring", &payload, Some(Duration::from_millis(5)));
        clock.advance(Duration::from_millis(10));

        store.set("new", &payload, None);

        assert_eq!(store.get::<String>("fresh"), Some(payload.clone()));
        assert_eq!(store.get::<String>("new"), Some(payload));
    }

    #[test]
    fn test_store_write_failure_is_swallowed() {
        let medium = Arc::new(MemoryMedium::with_quota(8));
        let store = CacheStore::new(medium.clone());

        store.set("too-big", &"this will never fit", None);

        assert_eq!(store.get::<String>("too-big"), None);
        assert_eq!(store.stats().write_failures, 2);
    }

    #[tokio::test]
    async fn test_with_cache_reads_through() {
        let (store, _, _) = store_with_clock();
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for _ in 0..3 {
            let value = store
                .with_cache(
                    "resources",
                    || async {
                        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        Ok(vec!["handbook".to_string()])
                    },
                    FetchOptions::default(),
                )
                .await
                .unwrap();
            assert_eq!(value, vec!["handbook"]);
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        store
            .with_cache(
                "resources",
                || async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(vec!["rulebook".to_string()])
                },
                FetchOptions {
                    force_refresh: true,
                    ..FetchOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(store.get::<Vec<String>>("resources"), Some(vec!["rulebook".to_string()]));
    }

    #[test]
    fn test_with_cache_propagates_fetch_error() {
        let (store, medium, _) = store_with_clock();

        let result: anyhow::Result<i32> = tokio_test::block_on(store.with_cache(
            "officials",
            || async { Err(anyhow::anyhow!("backend down")) },
            FetchOptions::default(),
        ));

        assert_eq!(result.unwrap_err().to_string(), "backend down");
        assert!(medium.is_empty());
    }
}
