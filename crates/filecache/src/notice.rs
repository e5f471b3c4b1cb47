//! Debug notices for degenerate inputs
//!
//! With `debug` enabled the cache reports calls it could not cache through a
//! [`DebugSink`]. The default sink forwards to `tracing`.

use std::fmt;

use tracing::info;

/// A diagnostic emitted when a call degrades to pass-through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No key could be resolved for the value or computation
    NoCachingKey,
    /// Caching is disabled (zero TTL); the call was not cached
    NoCaching { key: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoCachingKey => write!(f, "no caching key"),
            Notice::NoCaching { key } => write!(f, "no caching for {}", key),
        }
    }
}

/// Receives debug notices
pub trait DebugSink: Send + Sync {
    fn notice(&self, notice: Notice);
}

/// Emits notices as `tracing` events on the `filecache::debug` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn notice(&self, notice: Notice) {
        info!(target: "filecache::debug", "{}", notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_text() {
        assert_eq!(Notice::NoCachingKey.to_string(), "no caching key");
        assert_eq!(
            Notice::NoCaching { key: "k".into() }.to_string(),
            "no caching for k"
        );
    }
}
