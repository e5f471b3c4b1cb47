//! Cache directory maintenance: clear and garbage collection
//!
//! Both passes scan the cache directory once (non-recursive) and delete
//! entries independently. A failure on one entry is logged and the pass
//! carries on; failures are reported together at the end.

use std::io;

use tracing::{debug, warn};

use crate::cache::FileCache;
use crate::error::{CacheError, MaintenanceFailure, MaintenanceOperation, Result};
use crate::store::EntryInfo;

/// Outcome of a successful maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Entries deleted by this pass
    pub removed: usize,
    /// Entries left in place
    pub retained: usize,
}

impl FileCache {
    /// Delete every entry in the cache directory, fresh or not
    ///
    /// # Errors
    ///
    /// [`CacheError::Storage`] if the directory cannot be listed;
    /// [`CacheError::Maintenance`] if some entries could not be deleted
    /// (all others are still removed).
    pub fn clear_cache(&self) -> Result<MaintenanceReport> {
        self.sweep(MaintenanceOperation::Clear, |_| true)
    }

    /// Delete only entries that are no longer fresh
    ///
    /// # Errors
    ///
    /// As for [`clear_cache`](Self::clear_cache).
    pub fn garbage_collect(&self) -> Result<MaintenanceReport> {
        self.sweep(MaintenanceOperation::GarbageCollect, |entry| !entry.fresh)
    }

    fn sweep<F>(
        &self,
        operation: MaintenanceOperation,
        should_remove: F,
    ) -> Result<MaintenanceReport>
    where
        F: Fn(&EntryInfo) -> bool,
    {
        let entries = self.store().list(self.config().ttl)?;
        let mut report = MaintenanceReport::default();
        let mut failures = Vec::new();

        for entry in entries {
            if !should_remove(&entry) {
                report.retained += 1;
                continue;
            }

            match self.store().remove_path(&entry.path) {
                Ok(true) => {
                    report.removed += 1;
                    debug!("Removed cache entry: {}", entry.path.display());
                }
                // deleted by someone else in the meantime
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to remove cache entry {}: {}", entry.path.display(), e);
                    let source = match e {
                        CacheError::Storage { source, .. } => source,
                        other => io::Error::other(other.to_string()),
                    };
                    failures.push(MaintenanceFailure {
                        path: entry.path,
                        source,
                    });
                }
            }
        }

        debug!(
            operation = %operation,
            removed = report.removed,
            retained = report.retained,
            failed = failures.len(),
            "Cache maintenance finished"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(CacheError::Maintenance {
                operation,
                removed: report.removed,
                failures,
            })
        }
    }
}
