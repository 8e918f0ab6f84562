//! # Upgrade Command Implementation
//!
//! This module implements the `upgrade` subcommand: a sync pass that
//! re-resolves every ref to its latest commit, including mappings already
//! pinned to a hash. New hashes are written back to the manifest only if the
//! whole pass succeeds.

use anyhow::Result;
use clap::Args;

use subsync::sync::SyncOptions;

use crate::cli::GlobalArgs;
use crate::commands::sync;

/// Re-resolve every ref to its latest commit, then sync
#[derive(Args, Debug)]
pub struct UpgradeArgs {}

/// Execute the `upgrade` command.
pub fn execute(_args: UpgradeArgs, global: &GlobalArgs) -> Result<()> {
    sync::run(
        global,
        SyncOptions {
            force_upgrade: true,
        },
    )
}
