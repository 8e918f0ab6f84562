//! # Init Command Implementation
//!
//! This module implements the `init` subcommand, which creates an empty
//! `subsync.yaml` in the working directory. Running it again is a no-op: an
//! existing manifest, its targets and its comments are left exactly as they
//! are.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::GlobalArgs;

/// Create an empty subsync.yaml if there is none
#[derive(Args, Debug)]
pub struct InitArgs {}

/// Execute the `init` command.
pub fn execute(_args: InitArgs, global: &GlobalArgs) -> Result<()> {
    let store = global.store();
    let existed = store.path().exists();

    store
        .init()
        .with_context(|| format!("Failed to initialize {}", store.path().display()))?;

    if existed {
        println!("{} already exists", store.path().display());
    } else {
        println!("✅ Created {}", store.path().display());
        println!("💡 Run `subsync add` to map a folder, then `subsync sync`");
    }
    Ok(())
}
