//! Default values for subsync configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Name of the manifest file, relative to the working directory.
pub const MANIFEST_FILENAME: &str = "subsync.yaml";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "SUBSYNC_CACHE_DIR";

/// Environment variable overriding the scratch directory used by fetches.
pub const TEMP_DIR_ENV: &str = "SUBSYNC_TEMP_DIR";

/// Cache entries not touched for this long are evicted by a sweep.
pub const CACHE_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Number of attempts made for each external fetch or ref resolution.
pub const FETCH_ATTEMPTS: u32 = 3;

/// Fixed delay between two attempts of an external call.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/subsync` (XDG Base Directory)
/// - macOS: `~/Library/Caches/subsync`
/// - Windows: `{FOLDERID_LocalAppData}\subsync`
///
/// Falls back to `.subsync-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-dir` CLI flag or the
/// `SUBSYNC_CACHE_DIR` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".subsync-cache"))
        .join("subsync")
}
