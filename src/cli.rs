//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "wlmerge")]
#[command(author, version, about = "Merge, deduplicate and republish proxy config lists")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (missing file means defaults + environment)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Quiet mode (for cron/CI schedules)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch all sources, rebuild the output files and upload them
    Update {
        /// Fetch and process but don't write or upload anything
        #[arg(long)]
        dry_run: bool,

        /// Write local files but skip remote uploads
        #[arg(long)]
        no_upload: bool,
    },

    /// Deduplicate and renumber the selected list in place
    Selected {
        /// Selected file to rewrite (default: from config)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show how a single link is parsed, keyed and classified
    Check {
        /// Share link to inspect
        link: String,
    },

    /// List the configured whitelist subnets
    Subnets,

    /// Show version
    Version,
}
