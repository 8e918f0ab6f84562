//! # Fetch Cache
//!
//! A content-addressable, on-disk store of fetched repository subtrees.
//!
//! Entries are keyed by a digest of `(repo_url, repo_hash, repo_path)`, so
//! every mapping that points at the same upstream state shares one fetch, no
//! matter which target or folder asked for it.
//!
//! ## Publication protocol
//!
//! An entry is never written in place. A miss fetches into a private scratch
//! directory, strips git metadata, then renames the result onto the entry
//! path. If another process published the same key first, the rename fails
//! against the existing entry and the scratch copy is simply discarded: either
//! way exactly one complete entry exists afterwards.
//!
//! ## Eviction
//!
//! Every use touches the entry's modification time. [`FetchCache::sweep`]
//! removes whatever has not been touched within the retention window.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::cancel::CancellationToken;
use crate::defaults::CACHE_RETENTION;
use crate::error::{Error, Result};
use crate::filesystem::{copy_dir_all, dir_size, remove_path, replace_dir, set_modified, GIT_DIR};
use crate::manifest::Source;
use crate::repository::Fetcher;

/// Prefix of every cache key.
pub const KEY_PREFIX: &str = "cache-";

/// Length of a cache key, prefix included.
pub const KEY_LEN: usize = 30;

/// Prefix of scratch directories created inside the cache.
const TEMP_PREFIX: &str = "temp-";

/// Derive the cache key of a source.
///
/// ```
/// use subsync::cache::cache_key;
/// use subsync::manifest::Source;
///
/// let source = Source::new("https://example.com/r.git", "main", "logo").with_hash("abc");
/// let key = cache_key(&source);
/// assert!(key.starts_with("cache-"));
/// assert_eq!(key.len(), 30);
/// ```
pub fn cache_key(source: &Source) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}-{}-{}",
        source.repo_url, source.repo_hash, source.repo_path
    ));
    let mut key = format!("{}{:x}", KEY_PREFIX, hasher.finalize());
    key.truncate(KEY_LEN);
    key
}

/// Where the cache lives and how long entries are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding the entries.
    pub root: PathBuf,
    /// Directory scratch fetches are made in.
    pub temp_root: PathBuf,
    /// Entries untouched for longer than this are swept.
    pub retention: Duration,
}

impl CacheConfig {
    /// Cache at `root`, with scratch directories inside it and the default
    /// retention window.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            temp_root: root.clone(),
            root,
            retention: CACHE_RETENTION,
        }
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// How a destination was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    /// The entry already existed.
    Hit,
    /// The entry was fetched and published during this call.
    Fetched,
}

/// One entry found in the cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl CacheEntry {
    /// Total size in bytes of the files in the entry.
    ///
    /// Walks the entry's tree, so it is only computed on demand.
    pub fn size(&self) -> u64 {
        match fs::symlink_metadata(&self.path) {
            Ok(metadata) if metadata.is_dir() => dir_size(&self.path),
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        }
    }
}

/// The on-disk fetch cache.
#[derive(Debug, Clone)]
pub struct FetchCache {
    config: CacheConfig,
}

impl FetchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Path of the entry for `source`, whether or not it exists.
    pub fn entry_path(&self, source: &Source) -> PathBuf {
        self.config.root.join(cache_key(source))
    }

    /// Fill `destination` with the content of `source`, fetching it first if
    /// it is not cached yet.
    ///
    /// `destination` is fully replaced.
    pub fn materialize(
        &self,
        destination: &Path,
        source: &Source,
        fetcher: &dyn Fetcher,
        cancel: &CancellationToken,
    ) -> Result<Materialized> {
        let entry = self.entry_path(source);

        let outcome = match fs::symlink_metadata(&entry) {
            Ok(metadata) if metadata.is_dir() => {
                log::debug!("Cache hit for {} ({})", source.repo_url, entry.display());
                Materialized::Hit
            }
            Ok(_) => {
                log::warn!("Replacing malformed cache entry {}", entry.display());
                remove_path(&entry)?;
                self.populate(&entry, source, fetcher, cancel)?;
                Materialized::Fetched
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Cache miss for {} ({})", source.repo_url, entry.display());
                self.populate(&entry, source, fetcher, cancel)?;
                Materialized::Fetched
            }
            Err(e) => return Err(Error::fs(&entry, e)),
        };

        set_modified(&entry, SystemTime::now())?;

        cancel.check()?;
        replace_dir(&entry, destination)?;

        Ok(outcome)
    }

    fn populate(
        &self,
        entry: &Path,
        source: &Source,
        fetcher: &dyn Fetcher,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancel.check()?;

        fs::create_dir_all(&self.config.root).map_err(|e| Error::fs(&self.config.root, e))?;
        let scratch = scratch_dir(&self.config.temp_root)?;

        let outcome = fetcher
            .fetch(scratch.path(), source)
            .and_then(|fetched| self.publish(&fetched, entry));

        discard(scratch);
        outcome
    }

    /// Move a fetched tree into place as `entry`.
    fn publish(&self, fetched: &Path, entry: &Path) -> Result<()> {
        if !fetched.is_dir() {
            return Err(Error::Cache {
                message: format!("fetch result {} is not a directory", fetched.display()),
            });
        }
        remove_path(&fetched.join(GIT_DIR))?;

        if self.config.temp_root == self.config.root {
            return rename_into_place(fetched, entry);
        }

        // The scratch directory may be on another filesystem; stage a copy
        // next to the entry so the final rename stays atomic.
        let staging = scratch_dir(&self.config.root)?;
        let staged = staging.path().join("entry");
        let outcome = copy_dir_all(fetched, &staged).and_then(|_| rename_into_place(&staged, entry));
        discard(staging);
        outcome
    }

    /// List the entries currently in the cache, oldest first.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let root = &self.config.root;
        let dir = match fs::read_dir(root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::fs(root, e)),
        };

        let mut entries = Vec::new();
        for item in dir {
            let item = item.map_err(|e| Error::fs(root, e))?;
            let path = item.path();
            let metadata = match item.metadata() {
                Ok(metadata) => metadata,
                // Removed by a concurrent sweep.
                Err(_) => continue,
            };
            entries.push(CacheEntry {
                key: item.file_name().to_string_lossy().into_owned(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            });
        }

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Remove every entry last touched more than the retention window before
    /// `now`. Returns the removed paths.
    pub fn sweep(&self, now: SystemTime) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for entry in self.entries()? {
            let expired = now
                .duration_since(entry.modified)
                .map(|age| age > self.config.retention)
                .unwrap_or(false);
            if expired {
                log::debug!("Evicting {}", entry.path.display());
                remove_path(&entry.path)?;
                removed.push(entry.path);
            }
        }
        Ok(removed)
    }

    /// Remove every entry regardless of age. Returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            remove_path(&entry.path)?;
        }
        Ok(entries.len())
    }
}

fn scratch_dir(parent: &Path) -> Result<TempDir> {
    fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| Error::fs(parent, e))
}

/// Delete a scratch directory, logging instead of failing.
fn discard(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => {}
        // The fetched tree was the scratch directory itself and has been moved.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to clean up {}: {}", path.display(), e),
    }
}

fn rename_into_place(from: &Path, entry: &Path) -> Result<()> {
    match fs::rename(from, entry) {
        Ok(()) => Ok(()),
        Err(_) if entry.is_dir() => {
            log::debug!(
                "{} was published concurrently, discarding this copy",
                entry.display()
            );
            Ok(())
        }
        Err(e) => Err(Error::fs(entry, e)),
    }
}
