//! End-to-end tests for the `add` command.

mod common;
use common::prelude::*;

#[test]
fn test_add_creates_mapping() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["add", "vendor", "logo", "https://example.com/art.git", "main", "assets/logo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vendor/logo"));

    let manifest = fixture.manifest();
    assert!(manifest.contains("vendor:"));
    assert!(manifest.contains("folder_name: logo"));
    assert!(manifest.contains("repo_url: https://example.com/art.git"));
    assert!(manifest.contains("repo_path: assets/logo"));
    assert!(manifest.contains("repo_hash: ''"));
}

#[test]
fn test_add_with_hash() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["add", "vendor", "logo", "https://example.com/art.git", "v1", "logo", "abc123"])
        .assert()
        .success();

    assert!(fixture.manifest().contains("repo_hash: abc123"));
}

#[test]
fn test_add_same_folder_replaces() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["add", "x", "y", "https://example.com/u.git", "main", "p"])
        .assert()
        .success();
    fixture
        .command()
        .args(["add", "x", "./y/", "https://example.com/u.git", "release", "p"])
        .assert()
        .success();

    let manifest = fixture.manifest();
    assert_eq!(manifest.matches("folder_name: y").count(), 1);
    assert!(manifest.contains("repo_ref: release"));
    assert!(!manifest.contains("repo_ref: main"));
}

#[test]
fn test_add_is_idempotent() {
    let fixture = TestFixture::new();
    let args = ["add", "x", "y", "https://example.com/u.git", "main", "p"];

    fixture.command().args(args).assert().success();
    let first = fixture.manifest();
    fixture.command().args(args).assert().success();

    assert_eq!(fixture.manifest(), first);
}

#[test]
fn test_add_keeps_folders_sorted() {
    let fixture = TestFixture::new();

    for folder in ["zeta", "alpha", "mid"] {
        fixture
            .command()
            .args(["add", "t", folder, "https://example.com/u.git", "main", folder])
            .assert()
            .success();
    }

    let manifest = fixture.manifest();
    let alpha = manifest.find("folder_name: alpha").unwrap();
    let mid = manifest.find("folder_name: mid").unwrap();
    let zeta = manifest.find("folder_name: zeta").unwrap();
    assert!(alpha < mid && mid < zeta);
}

#[test]
fn test_add_preserves_comments() {
    let fixture = TestFixture::new().with_manifest(manifests::WITH_COMMENTS);

    fixture
        .command()
        .args(["add", "t", "f", "https://example.com/u.git", "main", "p"])
        .assert()
        .success();

    let manifest = fixture.manifest();
    assert!(manifest.starts_with("# Vendored assets.\n#\n# Managed by subsync; edit with care.\n\ntargets:\n"));
    assert!(manifest.ends_with("\n# end of file\n"));
}

#[test]
fn test_add_missing_arguments() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["add", "vendor", "logo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));

    fixture
        .child("subsync.yaml")
        .assert(predicate::path::missing());
}
