//! # Sync Orchestrator
//!
//! Composes the manifest store, the reconciliation engine and the fetch cache
//! into one pass:
//!
//! ```text
//! for each target (sorted):
//!     resolve refs     fill in missing repo_hash (or every one when upgrading)
//!     reconcile        prune entries the target no longer wants
//!     materialize      populate each folder from the fetch cache
//! sweep the cache
//! ```
//!
//! The whole pass runs inside one manifest edit, so resolved hashes are only
//! persisted if every target succeeded. Cache entries published before a
//! failure are kept for the next attempt.

use std::path::Path;
use std::time::SystemTime;

use crate::cache::{FetchCache, Materialized};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::manifest::{Mapping, ManifestStore};
use crate::path::clean_relative_path;
use crate::reconcile::reconcile;
use crate::repository::{Fetcher, RefResolver};

/// Options for one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Re-resolve every ref, even those already pinned to a hash.
    pub force_upgrade: bool,
}

/// What a sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub targets: usize,
    pub mappings: usize,
    pub cache_hits: usize,
    pub fetched: usize,
    pub resolved: usize,
    pub pruned: usize,
    pub evicted: usize,
}

/// Runs sync passes over one manifest.
pub struct Syncer<'a> {
    store: &'a ManifestStore,
    cache: &'a FetchCache,
    fetcher: &'a dyn Fetcher,
    resolver: &'a dyn RefResolver,
    options: SyncOptions,
    cancel: CancellationToken,
}

impl<'a> Syncer<'a> {
    pub fn new(
        store: &'a ManifestStore,
        cache: &'a FetchCache,
        fetcher: &'a dyn Fetcher,
        resolver: &'a dyn RefResolver,
    ) -> Self {
        Self {
            store,
            cache,
            fetcher,
            resolver,
            options: SyncOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one pass: resolve, reconcile and populate every target, then
    /// sweep the cache.
    pub fn run(&self) -> Result<SyncReport> {
        let store = self.store.clone().with_cancellation(self.cancel.clone());
        let work_dir = store.work_dir();
        let mut resolved = 0;
        let mut report = SyncReport::default();

        store.with_each_target(
            |target, mapping| {
                if self.resolve(mapping).map_err(|e| in_context(target, mapping, e))? {
                    resolved += 1;
                }
                Ok(())
            },
            |target, folder| self.populate_target(work_dir, target, folder, &mut report),
        )?;

        report.resolved = resolved;
        report.evicted = self.cache.sweep(SystemTime::now())?.len();
        if report.evicted > 0 {
            log::info!("Evicted {} stale cache entries", report.evicted);
        }

        Ok(report)
    }

    /// Pin `mapping` to a commit if needed. Returns whether the resolver was
    /// consulted.
    fn resolve(&self, mapping: &mut Mapping) -> Result<bool> {
        let source = &mut mapping.source;
        source.repo_path = clean_relative_path(&source.repo_path);

        if !source.repo_hash.is_empty() && !self.options.force_upgrade {
            return Ok(false);
        }

        self.cancel.check()?;
        let hash = self.resolver.resolve_ref(&source.repo_url, &source.repo_ref)?;
        if hash != source.repo_hash {
            log::info!(
                "{}@{} -> {}",
                source.repo_url,
                source.repo_ref,
                hash
            );
        }
        source.repo_hash = hash;
        Ok(true)
    }

    fn populate_target(
        &self,
        work_dir: &Path,
        target: &str,
        folder: &[Mapping],
        report: &mut SyncReport,
    ) -> Result<()> {
        if target == "." {
            return Err(Error::InvalidPath {
                path: target.to_string(),
                message: "a target must be a subdirectory of the manifest's directory".to_string(),
            });
        }

        let target_dir = work_dir.join(target);
        log::info!("Syncing '{}' ({} folders)", target, folder.len());

        report.pruned += reconcile(
            &target_dir,
            folder.iter().map(|mapping| mapping.folder_name.as_str()),
            &self.cancel,
        )?;

        for mapping in folder {
            let destination = target_dir.join(&mapping.folder_name);
            let outcome = self
                .cache
                .materialize(&destination, &mapping.source, self.fetcher, &self.cancel)
                .map_err(|e| in_context(target, mapping, e))?;

            match outcome {
                Materialized::Hit => report.cache_hits += 1,
                Materialized::Fetched => report.fetched += 1,
            }
            report.mappings += 1;
        }

        report.targets += 1;
        Ok(())
    }
}

/// Attach the target and folder to an error. Cancellation is passed through
/// as is.
fn in_context(target: &str, mapping: &Mapping, error: Error) -> Error {
    match error {
        Error::Cancelled => Error::Cancelled,
        other => Error::Sync {
            target: target.to_string(),
            folder: mapping.folder_name.clone(),
            source: Box::new(other),
        },
    }
}
