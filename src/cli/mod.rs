//! CLI command definitions for nyl-pages.
//!
//! This module defines the CLI structure using clap's derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Static site build pipeline and dev server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Path to an override config file (skips page.config.* discovery)
    #[arg(short, long, global = true, env = "NYL_PAGES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fail on a broken override file instead of falling back to defaults
    #[arg(long, global = true)]
    pub strict_config: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Remove the output and intermediate directories
    Clean,

    /// Clean, compile, bundle, and copy everything into the output directory
    Build,

    /// Compile once, then serve with live reload and rebuild on change
    Develop,
}
