//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which inspects and cleans
//! the fetch cache.
//!
//! ## Subcommands
//!
//! - **`list`**: Display every cache entry with its age and size
//! - **`clean`**: Evict entries past the retention window, or everything with `--all`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use subsync::cache::{CacheEntry, FetchCache};

use crate::cli::GlobalArgs;

/// Inspect or clean the fetch cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List cache entries
    List(ListArgs),
    /// Remove cache entries
    Clean(CleanArgs),
}

/// Arguments for the cache list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Remove every entry, not only those past the retention window
    #[arg(long)]
    pub all: bool,

    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs, global: &GlobalArgs) -> Result<()> {
    let cache = FetchCache::new(global.cache_config());
    match args.command {
        CacheSubcommand::List(list_args) => execute_list(&cache, list_args),
        CacheSubcommand::Clean(clean_args) => execute_clean(&cache, clean_args),
    }
}

/// Execute the `cache list` command.
fn execute_list(cache: &FetchCache, args: ListArgs) -> Result<()> {
    let entries = cache
        .entries()
        .with_context(|| format!("Failed to read cache at {}", cache.root().display()))?;
    let now = SystemTime::now();

    if args.json {
        println!("{}", entries_json(&entries, now)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No cache entries found in: {}", cache.root().display());
        return Ok(());
    }

    println!("Cache entries in {}:\n", cache.root().display());
    println!("{:<30} {:>12} {:>12}", "KEY", "AGE", "SIZE");
    println!("{}", "-".repeat(56));
    for entry in &entries {
        println!(
            "{:<30} {:>12} {:>12}",
            entry.key,
            format_age(age(entry, now)),
            format_size(entry.size())
        );
    }
    let total: u64 = entries.iter().map(CacheEntry::size).sum();
    println!("\nTotal: {} entries ({})", entries.len(), format_size(total));

    Ok(())
}

/// Execute the `cache clean` command.
fn execute_clean(cache: &FetchCache, args: CleanArgs) -> Result<()> {
    let now = SystemTime::now();

    if args.dry_run {
        let entries = cache
            .entries()
            .with_context(|| format!("Failed to read cache at {}", cache.root().display()))?;
        let retention = cache.config().retention;
        let doomed: Vec<&CacheEntry> = entries
            .iter()
            .filter(|entry| args.all || age(entry, now) > retention)
            .collect();
        for entry in &doomed {
            println!("  {} ({})", entry.key, format_size(entry.size()));
        }
        println!("\n🔎 Dry run mode - {} entries would be deleted.", doomed.len());
        return Ok(());
    }

    let removed = if args.all {
        cache.clear()
    } else {
        cache.sweep(now).map(|removed| removed.len())
    }
    .with_context(|| format!("Failed to clean cache at {}", cache.root().display()))?;

    println!("✅ Deleted {} cache entries.", removed);
    Ok(())
}

fn age(entry: &CacheEntry, now: SystemTime) -> Duration {
    now.duration_since(entry.modified).unwrap_or_default()
}

fn entries_json(entries: &[CacheEntry], now: SystemTime) -> Result<String> {
    let values: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "key": entry.key,
                "path": entry.path.display().to_string(),
                "size": entry.size(),
                "age_secs": age(entry, now).as_secs(),
                "modified": entry
                    .modified
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default(),
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&values)?)
}

/// Format age as a human-readable string
fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Format size in bytes to human-readable format
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
