//! # Error Handling
//!
//! This module defines the centralized error type for `subsync`. It uses the
//! `thiserror` library to build a single `Error` enum whose variants carry
//! enough context (manifest path, repository, ref, target, folder) for the
//! top-level error message to be actionable on its own.
//!
//! ## Taxonomy
//!
//! - **Configuration errors**: a manifest that cannot be parsed, or a path that
//!   cannot be normalized.
//! - **Lock errors**: the manifest lock could not be acquired.
//! - **Resolution errors**: the remote's refs could not be listed, or a ref
//!   does not exist upstream or matches more than one remote ref.
//! - **Fetch errors**: the fetch capability failed to materialize a subtree.
//! - **Filesystem errors**: reconciliation, cache publication or destination
//!   replacement failed on a specific path.
//! - **Cancellation**: the caller raised the cancellation token.
//!
//! Failures inside a sync pass are wrapped in [`Error::Sync`] so the message
//! names the target and folder that were being processed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for subsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The manifest file exists but does not contain a valid document.
    #[error("Failed to parse manifest {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// The exclusive (or shared) lock on the manifest could not be acquired.
    #[error("Failed to lock manifest {}: {message}", path.display())]
    ManifestLock { path: PathBuf, message: String },

    /// A path supplied by the user or found in the manifest is not usable.
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// Listing the remote's refs failed.
    #[error("Failed to resolve {url}@{reference}: {message}")]
    ResolveRef {
        url: String,
        reference: String,
        message: String,
    },

    /// The remote answered, but the ref matches no commit or several.
    #[error("Cannot resolve {url}@{reference}: {message}")]
    UnresolvableRef {
        url: String,
        reference: String,
        message: String,
    },

    /// The fetch capability failed to materialize the requested subtree.
    #[error("Failed to fetch '{path}' from {url} at {hash}: {message}")]
    Fetch {
        url: String,
        hash: String,
        path: String,
        message: String,
    },

    /// A filesystem operation failed on a specific path.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch cache is in a state it cannot recover from.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// A failure while syncing one mapping of one target.
    #[error("Failed to sync '{folder}' in target '{target}': {source}")]
    Sync {
        target: String,
        folder: String,
        #[source]
        source: Box<Error>,
    },

    /// The operation observed a raised cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error without a more specific path context.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Wraps an `io::Error` with the path it occurred on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether repeating the failed operation might succeed.
    ///
    /// Only failures of the network capabilities and of the disk qualify.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ResolveRef { .. } | Error::Fetch { .. } | Error::Filesystem { .. } | Error::Io(_)
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
