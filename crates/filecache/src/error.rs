//! Cache error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem read/write/delete failed
    #[error("Storage error on {path} ({operation}): {source}")]
    Storage {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// Stored bytes could not be decoded
    #[error("Failed to decode cache entry {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Value could not be encoded for storage
    #[error("Failed to encode value for key {key}: {message}")]
    Encode { key: String, message: String },

    /// Invalid configuration override
    #[error("Invalid configuration value for {field}: {message}")]
    Config { field: String, message: String },

    /// One or more entries could not be removed during maintenance
    #[error("{operation} removed {removed} entries but failed on {}", .failures.len())]
    Maintenance {
        operation: MaintenanceOperation,
        removed: usize,
        failures: Vec<MaintenanceFailure>,
    },

    /// A fallible computation returned an error; nothing was stored
    #[error("Computation failed: {source}")]
    Computation {
        key: Option<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Read,
    Write,
    Delete,
    List,
    CreateDir,
    Metadata,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Delete => write!(f, "delete"),
            IoOperation::List => write!(f, "list"),
            IoOperation::CreateDir => write!(f, "create dir"),
            IoOperation::Metadata => write!(f, "metadata"),
        }
    }
}

/// Which maintenance pass produced a batch error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOperation {
    Clear,
    GarbageCollect,
}

impl std::fmt::Display for MaintenanceOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceOperation::Clear => write!(f, "clear"),
            MaintenanceOperation::GarbageCollect => write!(f, "garbage collect"),
        }
    }
}

/// A single entry that maintenance could not remove
#[derive(Debug)]
pub struct MaintenanceFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl CacheError {
    /// Create a storage error
    pub fn io_error(path: PathBuf, operation: IoOperation, source: std::io::Error) -> Self {
        CacheError::Storage {
            path,
            operation,
            source,
        }
    }

    /// Create a decode error
    pub fn decode_error(path: PathBuf, message: impl Into<String>) -> Self {
        CacheError::Decode {
            path,
            message: message.into(),
        }
    }

    /// Create an encode error
    pub fn encode_error(key: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Encode {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the filesystem
    pub fn is_storage(&self) -> bool {
        matches!(self, CacheError::Storage { .. })
    }

    /// Whether this error came from a corrupt or foreign payload
    pub fn is_decode(&self) -> bool {
        matches!(self, CacheError::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = CacheError::io_error(
            PathBuf::from("/tmp/cache/key"),
            IoOperation::Write,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_storage());
        assert_eq!(
            err.to_string(),
            "Storage error on /tmp/cache/key (write): denied"
        );
    }

    #[test]
    fn test_maintenance_error_display() {
        let err = CacheError::Maintenance {
            operation: MaintenanceOperation::GarbageCollect,
            removed: 3,
            failures: vec![MaintenanceFailure {
                path: PathBuf::from("a"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "busy"),
            }],
        };
        assert_eq!(
            err.to_string(),
            "garbage collect removed 3 entries but failed on 1"
        );
    }
}
