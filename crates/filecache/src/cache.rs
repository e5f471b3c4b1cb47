//! The cache engine
//!
//! [`FileCache`] memoizes values and computation results on disk. Every call
//! follows the same path: resolve a key, check the entry's freshness, then
//! either decode the stored payload or persist the new one.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::config::{CacheConfig, CorruptEntryPolicy};
use crate::error::{CacheError, Result};
use crate::key::{CacheKey, KeyRef};
use crate::notice::{DebugSink, Notice, TracingSink};
use crate::registry::KeyExtractorRegistry;
use crate::store::{EntryInfo, EntryStore};

/// File-backed TTL cache
///
/// Operations take `&self`, so one instance can be shared across threads
/// behind an `Arc`. Concurrent misses on the same key within one instance
/// run the computation once; separate processes sharing a directory are not
/// coordinated and may each compute and write.
pub struct FileCache {
    config: CacheConfig,
    store: EntryStore,
    extractors: KeyExtractorRegistry,
    sink: Arc<dyn DebugSink>,
    locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl FileCache {
    /// Create a cache with no key extractors and the tracing debug sink
    pub fn new(config: CacheConfig) -> Self {
        let store = EntryStore::new(config.cache_dir.clone(), config.create_dir);
        Self {
            config,
            store,
            extractors: KeyExtractorRegistry::new(),
            sink: Arc::new(TracingSink),
            locks: DashMap::new(),
        }
    }

    /// Use `registry` to derive keys from structured values
    pub fn with_extractors(mut self, registry: KeyExtractorRegistry) -> Self {
        self.extractors = registry;
        self
    }

    /// Route debug notices to `sink`
    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the key extractor registry
    pub fn set_key_extractors(&mut self, registry: KeyExtractorRegistry) {
        self.extractors = registry;
    }

    /// Change the time-to-live for subsequent calls
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.config.ttl = ttl;
    }

    /// Enable or disable debug notices
    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    /// Current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read a configuration value by name
    pub fn get_config(&self, name: &str) -> Option<Value> {
        self.config.get(name)
    }

    /// The key extractor registry
    pub fn extractors(&self) -> &KeyExtractorRegistry {
        &self.extractors
    }

    pub(crate) fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Resolve the key for `value`; an explicit key always wins
    pub fn resolve_key(&self, value: &dyn Any, explicit: Option<&str>) -> Option<CacheKey> {
        self.extractors.resolve_key(value, explicit)
    }

    /// Return the cached value for `value`'s key, or store `value`
    ///
    /// With no explicit key the key is derived from `value` through the
    /// extractor registry. If no key can be resolved `value` is returned
    /// unchanged and nothing is written. On a hit the stored value is
    /// returned, which may differ from `value`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Storage`] on filesystem failures, [`CacheError::Decode`]
    /// for an undecodable entry (unless the corrupt-entry policy is
    /// `Recompute`), [`CacheError::Encode`] if `value` cannot be serialized.
    pub fn cache_value<T>(&self, value: T, explicit: Option<&str>) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Any,
    {
        let Some(key) = self.resolve_key(&value, explicit) else {
            self.notify(Notice::NoCachingKey);
            return Ok(value);
        };
        if self.caching_disabled(&key) {
            return Ok(value);
        }

        if let Some(cached) = self.lookup(&key)? {
            return Ok(cached);
        }

        self.persist(&key, &value)?;
        Ok(value)
    }

    /// Return the cached result for `key`, or run `compute` and store it
    ///
    /// `key` is either a literal key (`&str`, `&String`) or a structured
    /// value wrapped with [`KeyRef::value`] whose key comes from the
    /// registry. On a fresh entry `compute` is not called. If no key can be
    /// resolved `compute` runs and its result is returned uncached.
    ///
    /// # Errors
    ///
    /// As for [`cache_value`](Self::cache_value).
    pub fn cache_computation<'k, T, F>(&self, key: impl Into<KeyRef<'k>>, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.run_cached(key.into(), || Ok(compute()))
    }

    /// Like [`cache_computation`](Self::cache_computation) for computations
    /// that can fail
    ///
    /// Only `Ok` results are stored. An `Err` is returned as
    /// [`CacheError::Computation`] and leaves any existing entry untouched.
    pub fn try_cache_computation<'k, T, E, F>(
        &self,
        key: impl Into<KeyRef<'k>>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let key = key.into();
        let label = match key {
            KeyRef::Literal(raw) => Some(raw.to_string()),
            KeyRef::Value(_) => None,
        };
        self.run_cached(key, move || {
            compute().map_err(|e| CacheError::Computation {
                key: label,
                source: e.into(),
            })
        })
    }

    /// Whether `candidate` resolves to a key with a fresh entry
    ///
    /// Never fails: an unresolvable key or an I/O error reads as `false`.
    pub fn is_cached<'k>(&self, candidate: impl Into<KeyRef<'k>>) -> bool {
        let Some(key) = self.resolve(candidate.into()) else {
            return false;
        };

        match self.store.is_fresh(&key, self.config.ttl) {
            Ok(fresh) => fresh,
            Err(e) => {
                debug!("Freshness check failed for key {}: {}", key, e);
                false
            }
        }
    }

    /// Remove a single entry
    ///
    /// Returns `Ok(true)` if a file was deleted, `Ok(false)` if there was
    /// nothing to delete or no key could be resolved.
    pub fn invalidate<'k>(&self, key: impl Into<KeyRef<'k>>) -> Result<bool> {
        match self.resolve(key.into()) {
            Some(key) => {
                let removed = self.store.remove(&key)?;
                debug!("Invalidated cache for key: {} (removed: {})", key, removed);
                Ok(removed)
            }
            None => Ok(false),
        }
    }

    /// Snapshot of every file in the cache directory
    pub fn entries(&self) -> Result<Vec<EntryInfo>> {
        self.store.list(self.config.ttl)
    }

    fn resolve(&self, key: KeyRef<'_>) -> Option<CacheKey> {
        match key {
            KeyRef::Literal(raw) => CacheKey::sanitize(raw),
            KeyRef::Value(value) => self.extractors.resolve_key(value, None),
        }
    }

    fn run_cached<T, F>(&self, key: KeyRef<'_>, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let Some(key) = self.resolve(key) else {
            self.notify(Notice::NoCachingKey);
            return compute();
        };
        if self.caching_disabled(&key) {
            return compute();
        }

        if let Some(cached) = self.lookup(&key)? {
            return Ok(cached);
        }

        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock();

            // another caller may have filled the entry while we waited
            match self.lookup(&key) {
                Ok(Some(cached)) => Ok(cached),
                Ok(None) => compute().and_then(|value| {
                    self.persist(&key, &value)?;
                    Ok(value)
                }),
                Err(e) => Err(e),
            }
        };

        drop(lock);
        self.release_lock(&key);
        result
    }

    fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let Some(bytes) = self.store.read_fresh(key, self.config.ttl)? else {
            debug!("Cache miss for key: {}", key);
            return Ok(None);
        };

        match codec::decode(&bytes) {
            Ok(value) => {
                debug!("Cache hit for key: {}", key);
                Ok(Some(value))
            }
            Err(e) => match self.config.on_corrupt {
                CorruptEntryPolicy::Fail => Err(CacheError::decode_error(
                    self.store.path_for(key),
                    e.to_string(),
                )),
                CorruptEntryPolicy::Recompute => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    Ok(None)
                }
            },
        }
    }

    fn persist<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        let bytes = codec::encode(value, self.config.compress)
            .map_err(|e| CacheError::encode_error(key.as_str(), e.to_string()))?;
        self.store.write(key, &bytes)?;
        debug!("Cached value for key: {}", key);
        Ok(())
    }

    fn caching_disabled(&self, key: &CacheKey) -> bool {
        if self.config.ttl.is_zero() {
            self.notify(Notice::NoCaching {
                key: key.as_str().to_string(),
            });
            return true;
        }
        false
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(key.clone()).or_default())
    }

    /// Drop the key's lock once no other caller holds or waits on it
    fn release_lock(&self, key: &CacheKey) {
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn notify(&self, notice: Notice) {
        if self.config.debug {
            self.sink.notice(notice);
        }
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.config)
            .field("extractors", &self.extractors)
            .finish_non_exhaustive()
    }
}
