//! # subsync
//!
//! Declaratively mirror selected subdirectories of remote git repositories
//! into a local working tree.
//!
//! A manifest (`subsync.yaml`) lists *targets*, local directories that each
//! aggregate one or more *mappings*. A mapping binds a folder inside the target
//! to a subpath of an upstream repository at a ref. Every sync reconciles the
//! filesystem to match the manifest.
//!
//! ## Quick Example
//!
//! ```
//! use std::fs;
//! use std::path::{Path, PathBuf};
//! use subsync::cache::{CacheConfig, FetchCache};
//! use subsync::manifest::{ManifestStore, Source};
//! use subsync::sync::Syncer;
//!
//! let work = tempfile::tempdir().unwrap();
//! let store = ManifestStore::new(work.path());
//! store
//!     .upsert_mapping("vendor", "logo", Source::new("https://example.com/art.git", "main", "logo"))
//!     .unwrap();
//!
//! // Stand-ins for the git-backed capabilities.
//! let fetch = |temp_dir: &Path, source: &Source| -> subsync::Result<PathBuf> {
//!     let out = temp_dir.join(&source.repo_path);
//!     fs::create_dir_all(&out)?;
//!     fs::write(out.join("logo.svg"), "<svg/>")?;
//!     Ok(out)
//! };
//! let resolve = |_: &str, _: &str| -> subsync::Result<String> { Ok("abc123".to_string()) };
//!
//! let cache = FetchCache::new(CacheConfig::new(work.path().join(".cache")));
//! let report = Syncer::new(&store, &cache, &fetch, &resolve).run().unwrap();
//!
//! assert_eq!(report.fetched, 1);
//! assert!(work.path().join("vendor/logo/logo.svg").exists());
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifest (`manifest`, `lock`)**: the lock-protected, canonicalized
//!   document of targets and mappings. Leading and trailing comment blocks
//!   survive every rewrite.
//! - **Fetch cache (`cache`)**: content-addressable store of fetched subtrees,
//!   shared across targets and runs and published by atomic rename.
//! - **Reconciliation (`reconcile`)**: prefix-tree pruning of entries a target
//!   no longer wants.
//! - **Capabilities (`repository`, `git`)**: the `Fetcher` and `RefResolver`
//!   traits and their `git`-backed implementations.
//! - **Orchestration (`sync`)**: resolve, reconcile, materialize, sweep.

pub mod cache;
pub mod cancel;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod git;
pub mod lock;
pub mod manifest;
pub mod path;
pub mod reconcile;
pub mod repository;
pub mod sync;

#[cfg(test)]
mod path_proptest;

pub use error::{Error, Result};
