//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// blobsniff: classify files and screen compressed payloads for embedded markup
#[derive(Parser, Debug)]
#[command(name = "blobsniff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use a specific configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify files and check compressed content for markup
    Check {
        /// Files to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only match formats, don't peek into payloads
        #[arg(long)]
        no_content: bool,

        /// Zip members to scan after the first
        #[arg(long)]
        files: Option<usize>,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
