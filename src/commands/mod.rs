//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `subsync`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` together with the
//!   global options and performs the command's logic.
//!
//! The commands only translate between the command line and the `subsync`
//! library; they hold no sync logic of their own.

pub mod add;
pub mod cache;
pub mod completions;
pub mod init;
pub mod sync;
pub mod upgrade;
