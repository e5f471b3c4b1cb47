//! On-disk entry store
//!
//! One flat directory, one file per key. The file's modification time is the
//! entry's timestamp; reads never touch it, so reading cannot extend an
//! entry's life.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{CacheError, IoOperation, Result};
use crate::key::CacheKey;

/// Whether an entry written at `modified` is still fresh at `now`
///
/// Fresh iff `modified > now - ttl`. An entry is stale at exactly
/// `modified + ttl`. If `now - ttl` precedes the epoch every entry is fresh.
pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    match now.checked_sub(ttl) {
        Some(cutoff) => modified > cutoff,
        None => true,
    }
}

/// Snapshot of one file in the cache directory
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// The key this file stores, if its name is a canonical key encoding
    pub key: Option<CacheKey>,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size_bytes: u64,
    pub fresh: bool,
}

/// Flat-directory entry store
#[derive(Debug, Clone)]
pub struct EntryStore {
    dir: PathBuf,
    create_dir: bool,
}

impl EntryStore {
    /// Create a store over `dir`
    ///
    /// Nothing touches the filesystem until the first write.
    pub fn new(dir: impl Into<PathBuf>, create_dir: bool) -> Self {
        Self {
            dir: dir.into(),
            create_dir,
        }
    }

    /// File path for a key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Modification time of the entry, or `None` if it does not exist
    pub fn modified(&self, key: &CacheKey) -> Result<Option<SystemTime>> {
        let path = self.path_for(key);
        match fs::metadata(&path) {
            Ok(metadata) => metadata
                .modified()
                .map(Some)
                .map_err(|e| CacheError::io_error(path, IoOperation::Metadata, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io_error(path, IoOperation::Metadata, e)),
        }
    }

    /// Whether the entry exists and is younger than `ttl`
    pub fn is_fresh(&self, key: &CacheKey, ttl: Duration) -> Result<bool> {
        Ok(self
            .modified(key)?
            .is_some_and(|modified| is_fresh(modified, SystemTime::now(), ttl)))
    }

    /// Read the payload of an entry if it exists and is younger than `ttl`
    ///
    /// Freshness and content come from one open handle, so an entry removed
    /// concurrently reads as a miss rather than an error.
    pub fn read_fresh(&self, key: &CacheKey, ttl: Duration) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io_error(path, IoOperation::Read, e)),
        };

        let modified = file
            .metadata()
            .and_then(|metadata| metadata.modified())
            .map_err(|e| CacheError::io_error(path.clone(), IoOperation::Metadata, e))?;
        if !is_fresh(modified, SystemTime::now(), ttl) {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| CacheError::io_error(path, IoOperation::Read, e))?;
        Ok(Some(bytes))
    }

    /// Replace the entry's payload
    ///
    /// Bytes go to a temporary file in the cache directory which is then
    /// renamed over the target, so readers see the old or the new payload and
    /// never a partial one.
    pub fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        self.ensure_dir()?;

        let path = self.path_for(key);
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| CacheError::io_error(self.dir.clone(), IoOperation::Write, e))?;
        tmp.write_all(bytes)
            .map_err(|e| CacheError::io_error(path.clone(), IoOperation::Write, e))?;
        tmp.flush()
            .map_err(|e| CacheError::io_error(path.clone(), IoOperation::Write, e))?;
        tmp.persist(&path)
            .map_err(|e| CacheError::io_error(path.clone(), IoOperation::Write, e.error))?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    /// Remove the entry for `key`
    ///
    /// Returns `Ok(false)` if it was already gone.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        self.remove_path(&self.path_for(key))
    }

    /// Remove a file in the cache directory; a missing file is not an error
    pub fn remove_path(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io_error(path.to_path_buf(), IoOperation::Delete, e)),
        }
    }

    /// List every entry in the directory (single level)
    ///
    /// A missing directory lists as empty. Entries that vanish mid-scan are
    /// skipped; entries whose metadata cannot be read are logged and skipped.
    pub fn list(&self, ttl: Duration) -> Result<Vec<EntryInfo>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io_error(self.dir.clone(), IoOperation::List, e)),
        };

        let now = SystemTime::now();
        let mut entries = Vec::new();

        for entry in read_dir {
            let entry =
                entry.map_err(|e| CacheError::io_error(self.dir.clone(), IoOperation::List, e))?;
            let path = entry.path();

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Failed to stat cache entry {}: {}", path.display(), e);
                    continue;
                }
            };
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    continue;
                }
            };

            entries.push(EntryInfo {
                key: entry.file_name().to_str().and_then(CacheKey::from_file_name),
                path,
                modified,
                size_bytes: metadata.len(),
                fresh: is_fresh(modified, now, ttl),
            });
        }

        Ok(entries)
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.create_dir && !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| CacheError::io_error(self.dir.clone(), IoOperation::CreateDir, e))?;
            debug!("Created cache directory: {}", self.dir.display());
        }
        Ok(())
    }
}
