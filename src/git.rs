//! Default capabilities backed by the system `git` command.
//!
//! Using the `git` binary means authentication is whatever the user already
//! has configured:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Terminal prompts are disabled so a missing credential fails fast instead of
//! hanging the sync.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::filesystem::remove_path;
use crate::manifest::Source;
use crate::repository::{Fetcher, RefResolver};

/// Run `git` in `dir` and return its stdout, or its stderr as the error.
fn run_git(dir: &Path, args: &[&str]) -> std::result::Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| format!("failed to run git {}: {}", args.join(" "), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(explain_failure(args, &stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Provide a helpful message for common auth failures.
fn explain_failure(args: &[&str], stderr: &str) -> String {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        format!(
            "git {} failed: authentication failed. Make sure you have access to the repository.\n\
            For private repos, ensure you have:\n\
            - SSH key added to ssh-agent\n\
            - Git credentials configured\n\
            - Personal access token set up\n\
            Error: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )
    } else {
        format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )
    }
}

/// Pick the single commit a ref resolves to from `git ls-remote` output.
///
/// Output lines have the form `<hash>\t<refname>`. Annotated tags also list a
/// peeled `<refname>^{}` line, whose hash is the commit and wins over the tag
/// object's hash.
pub fn parse_ls_remote(output: &str) -> std::result::Result<String, String> {
    let mut refs: Vec<(String, String)> = Vec::new();

    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(hash), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };

        match name.strip_suffix("^{}") {
            Some(base) => match refs.iter_mut().find(|(existing, _)| existing == base) {
                Some(entry) => entry.1 = hash.to_string(),
                None => refs.push((base.to_string(), hash.to_string())),
            },
            None => {
                if !refs.iter().any(|(existing, _)| existing == name) {
                    refs.push((name.to_string(), hash.to_string()));
                }
            }
        }
    }

    match refs.as_slice() {
        [] => Err("ref not found".to_string()),
        [(_, hash)] => Ok(hash.clone()),
        many => Err(format!(
            "ref is ambiguous, it matches {}",
            many.iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

/// Resolve `reference` on `url` with `git ls-remote`.
pub fn ls_remote(url: &str, reference: &str) -> Result<String> {
    let output = run_git(Path::new("."), &["ls-remote", url, reference]).map_err(|message| {
        Error::ResolveRef {
            url: url.to_string(),
            reference: reference.to_string(),
            message,
        }
    })?;
    parse_ls_remote(&output).map_err(|message| Error::UnresolvableRef {
        url: url.to_string(),
        reference: reference.to_string(),
        message,
    })
}

/// Check out `repo_path` of `url` at commit `hash` into `root`.
///
/// Only the requested commit is fetched (depth 1, blobs filtered) and only the
/// requested subpath is checked out. Returns the directory holding the
/// subpath.
pub fn sparse_checkout(root: &Path, url: &str, hash: &str, repo_path: &str) -> Result<PathBuf> {
    let to_error = |message: String| Error::Fetch {
        url: url.to_string(),
        hash: hash.to_string(),
        path: repo_path.to_string(),
        message,
    };

    // Start from an empty directory, whatever an earlier attempt left behind.
    remove_path(root)?;
    fs::create_dir_all(root).map_err(|e| Error::fs(root, e))?;

    run_git(root, &["init", "--quiet"]).map_err(to_error)?;
    run_git(root, &["config", "advice.detachedHead", "false"]).map_err(to_error)?;
    run_git(root, &["remote", "add", "origin", url]).map_err(to_error)?;
    // Blobs outside the sparse cone are fetched lazily from origin.
    run_git(root, &["config", "remote.origin.promisor", "true"]).map_err(to_error)?;
    run_git(root, &["config", "remote.origin.partialclonefilter", "blob:none"]).map_err(to_error)?;
    if repo_path != "." {
        run_git(root, &["sparse-checkout", "set", "--cone", repo_path]).map_err(to_error)?;
    }
    run_git(
        root,
        &["fetch", "--quiet", "--depth=1", "--filter=blob:none", "origin", hash],
    )
    .map_err(to_error)?;
    run_git(root, &["checkout", "--quiet", "FETCH_HEAD"]).map_err(to_error)?;

    let out = root.join(repo_path);
    if !out.is_dir() {
        return Err(to_error(format!(
            "'{}' is not a directory at this commit",
            repo_path
        )));
    }
    Ok(out)
}

/// [`Fetcher`] using a sparse, shallow `git` checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitFetcher;

impl Fetcher for GitFetcher {
    fn fetch(&self, temp_dir: &Path, source: &Source) -> Result<PathBuf> {
        log::info!(
            "Cloning '{}' from {} at {}",
            source.repo_path,
            source.repo_url,
            source.repo_hash
        );
        sparse_checkout(
            temp_dir,
            &source.repo_url,
            &source.repo_hash,
            &source.repo_path,
        )
    }
}

/// [`RefResolver`] using `git ls-remote`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitResolver;

impl RefResolver for GitResolver {
    fn resolve_ref(&self, repo_url: &str, reference: &str) -> Result<String> {
        log::info!("Resolving {}@{}", repo_url, reference);
        ls_remote(repo_url, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls_remote_single_branch() {
        let output = "9f0ea0341816665feadcdcfb7744f4245604ab28\trefs/heads/main\n";
        assert_eq!(
            parse_ls_remote(output).unwrap(),
            "9f0ea0341816665feadcdcfb7744f4245604ab28"
        );
    }

    #[test]
    fn test_parse_ls_remote_not_found() {
        let err = parse_ls_remote("").unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_parse_ls_remote_ambiguous() {
        let output = "aaa\trefs/heads/v1\nbbb\trefs/tags/v1\n";
        let err = parse_ls_remote(output).unwrap_err();
        assert!(err.contains("ambiguous"));
        assert!(err.contains("refs/heads/v1"));
        assert!(err.contains("refs/tags/v1"));
    }

    #[test]
    fn test_parse_ls_remote_prefers_peeled_tag() {
        let output = "tagobject\trefs/tags/v1.0.0\ncommit\trefs/tags/v1.0.0^{}\n";
        assert_eq!(parse_ls_remote(output).unwrap(), "commit");
    }

    #[test]
    fn test_explain_failure_auth_hint() {
        let message = explain_failure(&["fetch"], "fatal: Authentication failed for 'x'");
        assert!(message.contains("authentication failed"));
        assert!(message.contains("SSH key"));
    }

    #[test]
    fn test_explain_failure_plain() {
        let message = explain_failure(&["fetch"], "fatal: couldn't find remote ref\n");
        assert_eq!(message, "git fetch failed: fatal: couldn't find remote ref");
    }

    #[test]
    #[cfg_attr(not(feature = "integration-tests"), ignore)]
    fn test_ls_remote_real_repository() {
        let hash = ls_remote("https://github.com/git/git.git", "refs/heads/master").unwrap();
        assert_eq!(hash.len(), 40);
    }
}
