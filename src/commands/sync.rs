//! # Sync Command Implementation
//!
//! This module implements the `sync` subcommand. For every target in the
//! manifest it resolves refs that have no hash yet, prunes entries the target
//! no longer wants, and populates each folder from the fetch cache. Stale
//! cache entries are swept at the end.
//!
//! Fetches and ref resolutions go through the system `git` and are retried a
//! bounded number of times. Ctrl-C aborts cleanly: the manifest is only
//! rewritten when the whole pass succeeds.

use anyhow::{Context, Result};
use clap::Args;

use subsync::cache::FetchCache;
use subsync::defaults::{FETCH_ATTEMPTS, RETRY_DELAY};
use subsync::git::{GitFetcher, GitResolver};
use subsync::repository::Retrying;
use subsync::sync::{SyncOptions, SyncReport, Syncer};

use crate::cli::{interrupt_token, GlobalArgs};

/// Resolve missing hashes, prune and populate every target
#[derive(Args, Debug)]
pub struct SyncArgs {}

/// Execute the `sync` command.
pub fn execute(_args: SyncArgs, global: &GlobalArgs) -> Result<()> {
    run(global, SyncOptions::default())
}

/// Run one sync pass with the git-backed capabilities.
pub fn run(global: &GlobalArgs, options: SyncOptions) -> Result<()> {
    let store = global.store();
    let cache = FetchCache::new(global.cache_config());
    let cancel = interrupt_token()?;

    let fetcher = Retrying::new(GitFetcher, FETCH_ATTEMPTS, RETRY_DELAY)
        .with_cancellation(cancel.clone());
    let resolver = Retrying::new(GitResolver, FETCH_ATTEMPTS, RETRY_DELAY)
        .with_cancellation(cancel.clone());

    log::debug!("Using cache at {}", cache.root().display());

    let report = Syncer::new(&store, &cache, &fetcher, &resolver)
        .with_options(options)
        .with_cancellation(cancel)
        .run()
        .with_context(|| format!("Sync of {} failed", store.path().display()))?;

    println!("{}", summary(&report));
    Ok(())
}

fn summary(report: &SyncReport) -> String {
    format!(
        "✅ Synced {} folders in {} targets ({} fetched, {} from cache, {} refs resolved, {} pruned, {} evicted)",
        report.mappings,
        report.targets,
        report.fetched,
        report.cache_hits,
        report.resolved,
        report.pruned,
        report.evicted,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_counts() {
        let report = SyncReport {
            targets: 2,
            mappings: 3,
            cache_hits: 1,
            fetched: 2,
            resolved: 3,
            pruned: 4,
            evicted: 5,
        };
        let line = summary(&report);
        assert!(line.contains("3 folders in 2 targets"));
        assert!(line.contains("2 fetched"));
        assert!(line.contains("1 from cache"));
        assert!(line.contains("4 pruned"));
        assert!(line.contains("5 evicted"));
    }
}
