//! Cache configuration
//!
//! [`CacheConfig`] is built once from defaults plus caller overrides and then
//! handed to [`crate::FileCache`]. Overrides come either as a typed
//! [`CacheSettings`] (deserializable from any serde format) or as a loose
//! JSON key/value map that also accepts the legacy `cacheDir`/`cacheTime` names.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CacheError, Result};

/// Default directory for cache entries
pub const DEFAULT_CACHE_DIR: &str = "cache/phpcache";

/// Default time-to-live in seconds
pub const DEFAULT_TTL_SECS: u64 = 360;

/// What to do when a stored entry cannot be decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptEntryPolicy {
    /// Surface a decode error to the caller
    #[default]
    Fail,
    /// Log a warning and treat the entry as a miss
    Recompute,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Directory holding one file per entry
    pub cache_dir: PathBuf,
    /// Age after which an entry is stale
    pub ttl: Duration,
    /// Emit diagnostic notices for degenerate inputs
    pub debug: bool,
    /// Gzip payloads before writing
    pub compress: bool,
    /// Behaviour on undecodable entries
    pub on_corrupt: CorruptEntryPolicy,
    /// Create `cache_dir` on first write if missing
    pub create_dir: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            debug: false,
            compress: true,
            on_corrupt: CorruptEntryPolicy::Fail,
            create_dir: true,
        }
    }
}

/// Caller-supplied overrides; unset fields keep their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(alias = "cacheDir")]
    pub cache_dir: Option<PathBuf>,
    #[serde(alias = "cacheTime")]
    pub ttl_secs: Option<u64>,
    pub debug: Option<bool>,
    pub compress: Option<bool>,
    pub on_corrupt: Option<CorruptEntryPolicy>,
    pub create_dir: Option<bool>,
}

impl CacheConfig {
    /// Merge `settings` over the defaults; each set field wins
    pub fn configure(settings: CacheSettings) -> Self {
        let mut config = Self::default();
        config.apply(settings);
        config
    }

    /// Build a configuration from a loose key/value mapping
    ///
    /// Recognised keys: `cache_dir`/`cacheDir`, `ttl_secs`/`cacheTime`,
    /// `debug`, `compress`, `on_corrupt`, `create_dir`. The TTL may be a
    /// number or a numeric string. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when a recognised key has the wrong
    /// type or the TTL is negative.
    pub fn from_overrides(overrides: &Map<String, Value>) -> Result<Self> {
        let mut settings = CacheSettings::default();

        for (name, value) in overrides {
            match name.as_str() {
                "cache_dir" | "cacheDir" => {
                    let dir = value
                        .as_str()
                        .ok_or_else(|| CacheError::config_error(name, "expected a path string"))?;
                    settings.cache_dir = Some(PathBuf::from(dir));
                }
                "ttl_secs" | "cacheTime" => {
                    settings.ttl_secs = Some(parse_ttl(name, value)?);
                }
                "debug" => settings.debug = Some(parse_bool(name, value)?),
                "compress" => settings.compress = Some(parse_bool(name, value)?),
                "create_dir" => settings.create_dir = Some(parse_bool(name, value)?),
                "on_corrupt" => {
                    let policy = serde_json::from_value(value.clone())
                        .map_err(|e| CacheError::config_error(name, e.to_string()))?;
                    settings.on_corrupt = Some(policy);
                }
                other => debug!(key = %other, "Ignoring unknown cache setting"),
            }
        }

        Ok(Self::configure(settings))
    }

    /// Read a setting by name
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "cache_dir" | "cacheDir" => Some(Value::String(
                self.cache_dir.to_string_lossy().into_owned(),
            )),
            "ttl_secs" | "cacheTime" => Some(ttl_value(self.ttl)),
            "debug" => Some(Value::Bool(self.debug)),
            "compress" => Some(Value::Bool(self.compress)),
            "create_dir" => Some(Value::Bool(self.create_dir)),
            "on_corrupt" => serde_json::to_value(self.on_corrupt).ok(),
            _ => None,
        }
    }

    /// Set the cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable diagnostic notices
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable payload compression
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the corrupt-entry policy
    pub fn with_corrupt_policy(mut self, policy: CorruptEntryPolicy) -> Self {
        self.on_corrupt = policy;
        self
    }

    /// Whether to create the cache directory on first write
    pub fn with_create_dir(mut self, create_dir: bool) -> Self {
        self.create_dir = create_dir;
        self
    }

    fn apply(&mut self, settings: CacheSettings) {
        if let Some(dir) = settings.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(secs) = settings.ttl_secs {
            self.ttl = Duration::from_secs(secs);
        }
        if let Some(debug) = settings.debug {
            self.debug = debug;
        }
        if let Some(compress) = settings.compress {
            self.compress = compress;
        }
        if let Some(policy) = settings.on_corrupt {
            self.on_corrupt = policy;
        }
        if let Some(create_dir) = settings.create_dir {
            self.create_dir = create_dir;
        }
    }
}

fn parse_ttl(name: &str, value: &Value) -> Result<u64> {
    let secs = match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            CacheError::config_error(name, format!("expected whole seconds, got {}", n))
        })?,
        Value::String(s) => s.trim().parse::<i64>().map_err(|e| {
            CacheError::config_error(name, format!("invalid seconds {:?}: {}", s, e))
        })?,
        other => {
            return Err(CacheError::config_error(
                name,
                format!("expected seconds, got {}", other),
            ))
        }
    };

    u64::try_from(secs).map_err(|_| {
        CacheError::config_error(name, format!("TTL must not be negative, got {}", secs))
    })
}

/// Whole seconds as an integer; sub-second TTLs keep their fraction
fn ttl_value(ttl: Duration) -> Value {
    if ttl.subsec_nanos() == 0 {
        Value::from(ttl.as_secs())
    } else {
        Value::from(ttl.as_secs_f64())
    }
}

fn parse_bool(name: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| CacheError::config_error(name, format!("expected a boolean, got {}", value)))
}
