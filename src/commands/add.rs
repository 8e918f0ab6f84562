//! # Add Command Implementation
//!
//! This module implements the `add` subcommand, which inserts one mapping into
//! the manifest, or replaces the source of an existing mapping with the same
//! target and folder name. Nothing is fetched; run `sync` afterwards.

use anyhow::{Context, Result};
use clap::Args;

use subsync::manifest::Source;

use crate::cli::GlobalArgs;

/// Add or replace one folder mapping
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Local directory (relative to the manifest) that holds the folder
    pub target: String,

    /// Folder name inside the target
    pub folder_name: String,

    /// Repository URL
    pub repo_url: String,

    /// Branch or tag to track
    pub repo_ref: String,

    /// Subpath within the repository to mirror
    pub repo_path: String,

    /// Commit to pin to; resolved from the ref on the next sync when omitted
    pub repo_hash: Option<String>,
}

/// Execute the `add` command.
pub fn execute(args: AddArgs, global: &GlobalArgs) -> Result<()> {
    let store = global.store();
    let source = Source::new(args.repo_url, args.repo_ref, args.repo_path)
        .with_hash(args.repo_hash.unwrap_or_default());

    store
        .upsert_mapping(&args.target, &args.folder_name, source)
        .with_context(|| format!("Failed to update {}", store.path().display()))?;

    println!(
        "✅ Mapped {}/{} in {}",
        args.target,
        args.folder_name,
        store.path().display()
    );
    Ok(())
}
