//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_manifest(manifests::EMPTY);
//!     fixture.command().arg("init").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    #[allow(unused_imports)]
    pub use super::UpstreamRepo;
    pub use super::TestFixture;
}

/// Manifest snippets for testing.
#[allow(dead_code)]
pub mod manifests {
    /// A manifest with no targets.
    pub const EMPTY: &str = "targets: {}\n";

    /// A manifest with a documentation header and footer.
    pub const WITH_COMMENTS: &str = "# Vendored assets.\n#\n# Managed by subsync; edit with care.\n\ntargets: {}\n\n# end of file\n";

    /// Not a valid manifest.
    pub const INVALID_YAML: &str = "targets: [unclosed\n";
}

/// A temporary working directory with its own cache directory.
///
/// Commands created from the fixture run inside the working directory and
/// never touch the user's real cache.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `subsync.yaml` with the given content.
    pub fn with_manifest(self, content: &str) -> Self {
        self.temp_dir
            .child("subsync.yaml")
            .write_str(content)
            .expect("Failed to write manifest");
        self
    }

    /// Add a file with the given path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the working directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.temp_dir.path().join("subsync.yaml")
    }

    /// Read the manifest back.
    #[allow(dead_code)]
    pub fn manifest(&self) -> String {
        std::fs::read_to_string(self.manifest_path()).expect("Failed to read manifest")
    }

    /// The cache directory commands are pointed at.
    pub fn cache_dir(&self) -> PathBuf {
        self.temp_dir.path().join(".cache")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("subsync");
        cmd.current_dir(self.path())
            .env("SUBSYNC_CACHE_DIR", self.cache_dir())
            .env_remove("SUBSYNC_TEMP_DIR")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A throwaway upstream repository served over `file://`.
#[allow(dead_code)]
pub struct UpstreamRepo {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl UpstreamRepo {
    /// Initialize an empty repository that allows shallow, filtered fetches
    /// of any reachable commit.
    pub fn new() -> Self {
        let repo = Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        };
        repo.git(&["init", "--quiet", "--initial-branch=main"]);
        repo.git(&["config", "uploadpack.allowFilter", "true"]);
        repo.git(&["config", "uploadpack.allowReachableSHA1InWant", "true"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }

    /// Write a file into the working tree.
    pub fn write(&self, path: &str, content: &str) -> &Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write upstream file");
        self
    }

    /// Commit everything and return the new commit hash.
    pub fn commit(&self, message: &str) -> String {
        self.git(&["add", "--all"]);
        self.git(&[
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "--quiet",
            "-m",
            message,
        ]);
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_manifest() {
        let fixture = TestFixture::new().with_manifest(manifests::EMPTY);
        assert!(fixture.manifest_path().exists());
    }

    #[test]
    fn test_manifests_parse_as_expected() {
        for manifest in [manifests::EMPTY, manifests::WITH_COMMENTS] {
            serde_yaml::from_str::<serde_yaml::Value>(manifest).expect("Manifest should be valid YAML");
        }
        assert!(serde_yaml::from_str::<serde_yaml::Value>(manifests::INVALID_YAML).is_err());
    }
}
