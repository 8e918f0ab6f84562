//! CLI argument parsing and command dispatch

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use subsync::cache::CacheConfig;
use subsync::cancel::CancellationToken;
use subsync::defaults::{default_cache_root, CACHE_DIR_ENV, TEMP_DIR_ENV};
use subsync::manifest::ManifestStore;

use crate::commands;

/// subsync - Mirror subdirectories of remote git repositories into your tree
#[derive(Parser, Debug)]
#[command(name = "subsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding subsync.yaml; targets are relative to it
    #[arg(short = 'C', long, global = true, value_name = "DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Cache directory (defaults to the platform cache directory)
    #[arg(long, global = true, value_name = "DIR", env = CACHE_DIR_ENV)]
    pub cache_dir: Option<PathBuf>,

    /// Scratch directory for fetches (defaults to the cache directory)
    #[arg(long, global = true, value_name = "DIR", env = TEMP_DIR_ENV)]
    pub temp_dir: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GlobalArgs {
    pub fn store(&self) -> ManifestStore {
        ManifestStore::new(&self.work_dir)
    }

    pub fn cache_config(&self) -> CacheConfig {
        let root = self.cache_dir.clone().unwrap_or_else(default_cache_root);
        match &self.temp_dir {
            Some(temp_dir) => CacheConfig::new(root).with_temp_root(temp_dir),
            None => CacheConfig::new(root),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty subsync.yaml if there is none
    Init(commands::init::InitArgs),

    /// Add or replace one folder mapping
    Add(commands::add::AddArgs),

    /// Resolve missing hashes, prune and populate every target
    Sync(commands::sync::SyncArgs),

    /// Re-resolve every ref to its latest commit, then sync
    Upgrade(commands::upgrade::UpgradeArgs),

    /// Inspect or clean the fetch cache
    Cache(commands::cache::CacheArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.global.log_level);

        match self.command {
            Commands::Init(args) => commands::init::execute(args, &self.global),
            Commands::Add(args) => commands::add::execute(args, &self.global),
            Commands::Sync(args) => commands::sync::execute(args, &self.global),
            Commands::Upgrade(args) => commands::upgrade::execute(args, &self.global),
            Commands::Cache(args) => commands::cache::execute(args, &self.global),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running under tests.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

/// A token raised by SIGINT or SIGTERM.
pub fn interrupt_token() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // A second signal terminates immediately.
        signal_hook::flag::register_conditional_shutdown(signal, 1, token.flag())
            .with_context(|| format!("Failed to install handler for signal {}", signal))?;
        signal_hook::flag::register(signal, token.flag())
            .with_context(|| format!("Failed to install handler for signal {}", signal))?;
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    #[serial_test::serial]
    fn test_global_args_after_subcommand() {
        let cli = Cli::try_parse_from(["subsync", "sync", "-C", "/work", "--cache-dir", "/c"]).unwrap();
        assert_eq!(cli.global.work_dir, PathBuf::from("/work"));
        let config = cli.global.cache_config();
        assert_eq!(config.root, PathBuf::from("/c"));
        assert_eq!(config.temp_root, PathBuf::from("/c"));
    }

    #[test]
    #[serial_test::serial]
    fn test_temp_dir_override() {
        let cli = Cli::try_parse_from([
            "subsync",
            "--cache-dir",
            "/c",
            "--temp-dir",
            "/t",
            "sync",
        ])
        .unwrap();
        assert_eq!(cli.global.cache_config().temp_root, PathBuf::from("/t"));
    }

    #[test]
    #[serial_test::serial]
    fn test_cache_dirs_from_environment() {
        std::env::set_var(CACHE_DIR_ENV, "/env/cache");
        std::env::set_var(TEMP_DIR_ENV, "/env/tmp");
        let parsed = Cli::try_parse_from(["subsync", "sync"]);
        std::env::remove_var(CACHE_DIR_ENV);
        std::env::remove_var(TEMP_DIR_ENV);

        let config = parsed.unwrap().global.cache_config();
        assert_eq!(config.root, PathBuf::from("/env/cache"));
        assert_eq!(config.temp_root, PathBuf::from("/env/tmp"));
    }

    #[test]
    #[serial_test::serial]
    fn test_flag_wins_over_environment() {
        std::env::set_var(CACHE_DIR_ENV, "/env/cache");
        let parsed = Cli::try_parse_from(["subsync", "--cache-dir", "/flag", "sync"]);
        std::env::remove_var(CACHE_DIR_ENV);

        assert_eq!(parsed.unwrap().global.cache_config().root, PathBuf::from("/flag"));
    }
}
