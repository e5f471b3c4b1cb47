//! # filecache
//!
//! A file-backed time-to-live cache. It memoizes either a value or the
//! result of a zero-argument computation under a key, storing the encoded
//! result as one file in a cache directory. An entry is fresh while its
//! modification time is younger than the configured TTL.
//!
//! ## Features
//!
//! - **Explicit or derived keys**: pass a key, or register extractors that
//!   derive one from structured values by type or custom capability
//! - **Computation skip**: a fresh entry short-circuits the computation
//! - **Atomic writes**: entries are written to a temp file and renamed
//! - **Maintenance**: clear everything or garbage-collect stale entries
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use filecache::{CacheConfig, FileCache, KeyExtractorRegistry, KeyRef};
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct User { id: u64, name: String }
//!
//! # fn main() -> filecache::Result<()> {
//! let cache = FileCache::new(
//!     CacheConfig::default()
//!         .with_cache_dir("cache/users")
//!         .with_ttl(Duration::from_secs(600)),
//! )
//! .with_extractors(KeyExtractorRegistry::new().with::<User, _>(|u| format!("user-{}", u.id)));
//!
//! let _report: String = cache.cache_computation("weekly-report", || "expensive".to_string())?;
//! let user = cache.cache_value(User { id: 1, name: "ada".into() }, None)?;
//! assert!(cache.is_cached(KeyRef::value(&user)));
//! cache.garbage_collect()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod maintenance;
pub mod notice;
pub mod registry;
pub mod store;

pub use cache::FileCache;
pub use config::{CacheConfig, CacheSettings, CorruptEntryPolicy};
pub use error::{CacheError, IoOperation, MaintenanceFailure, MaintenanceOperation, Result};
pub use key::{CacheKey, KeyRef};
pub use maintenance::MaintenanceReport;
pub use notice::{DebugSink, Notice, TracingSink};
pub use registry::{Capability, KeyExtractorRegistry};
pub use store::{EntryInfo, EntryStore};
