//! # External Capabilities
//!
//! The sync core never talks to a remote directly. It depends on two narrow
//! capabilities:
//!
//! - **[`Fetcher`]**: materialize one subpath of a repository at a commit into
//!   a scratch directory the core owns.
//! - **[`RefResolver`]**: turn a branch or tag into a single commit hash.
//!
//! The default implementations in [`crate::git`] shell out to the system `git`.
//! Tests substitute closures or recording fakes; both traits are implemented
//! for any `Fn` with the matching signature.
//!
//! Network calls are flaky, so [`Retrying`] wraps either capability with a
//! bounded number of attempts and a fixed delay between them. Only transient
//! errors (see [`crate::Error::is_transient`]) are retried. Retrying is a
//! property of the capability, not of the sync core.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::manifest::Source;

/// Trait for fetching repository content - allows mocking in tests
pub trait Fetcher {
    /// Materialize `source.repo_path` at `source.repo_hash` somewhere inside
    /// `temp_dir` and return the directory holding it.
    ///
    /// `temp_dir` is owned by the caller and deleted after the call whether or
    /// not it succeeds.
    fn fetch(&self, temp_dir: &Path, source: &Source) -> Result<PathBuf>;
}

/// Trait for resolving refs - allows mocking in tests
pub trait RefResolver {
    /// Resolve `reference` on `repo_url` to exactly one commit hash.
    fn resolve_ref(&self, repo_url: &str, reference: &str) -> Result<String>;
}

impl<F> Fetcher for F
where
    F: Fn(&Path, &Source) -> Result<PathBuf>,
{
    fn fetch(&self, temp_dir: &Path, source: &Source) -> Result<PathBuf> {
        self(temp_dir, source)
    }
}

impl<F> RefResolver for F
where
    F: Fn(&str, &str) -> Result<String>,
{
    fn resolve_ref(&self, repo_url: &str, reference: &str) -> Result<String> {
        self(repo_url, reference)
    }
}

/// Retries a capability a bounded number of times with a fixed delay.
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    attempts: u32,
    delay: Duration,
    cancel: CancellationToken,
}

impl<T> Retrying<T> {
    /// Wrap `inner`; `attempts` is clamped to at least one.
    ///
    /// A fetcher wrapped this way receives the same `temp_dir` on every
    /// attempt and must tolerate what a failed attempt left in it.
    pub fn new(inner: T, attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop retrying once `cancel` is raised.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn run<R>(&self, what: &str, mut call: impl FnMut() -> Result<R>) -> Result<R> {
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= self.attempts => return Err(e),
                Err(e) => {
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.attempts,
                        e,
                        self.delay
                    );
                    thread::sleep(self.delay);
                    self.cancel.check()?;
                    attempt += 1;
                }
            }
        }
    }
}

impl<T: Fetcher> Fetcher for Retrying<T> {
    fn fetch(&self, temp_dir: &Path, source: &Source) -> Result<PathBuf> {
        self.run(&format!("Fetching {}", source.repo_url), || {
            self.inner.fetch(temp_dir, source)
        })
    }
}

impl<T: RefResolver> RefResolver for Retrying<T> {
    fn resolve_ref(&self, repo_url: &str, reference: &str) -> Result<String> {
        self.run(&format!("Resolving {}@{}", repo_url, reference), || {
            self.inner.resolve_ref(repo_url, reference)
        })
    }
}
