//! wlmerge - proxy config list aggregator
//!
//! Periodic batch job: fetch share-link lists, deduplicate, classify and republish.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use wlmerge::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Update { dry_run, no_upload } => {
            wlmerge::commands::update::run(dry_run, no_upload, &cli.config).await
        }
        Commands::Selected { file } => {
            wlmerge::commands::selected::run(file.as_deref(), &cli.config).await
        }
        Commands::Check { link } => wlmerge::commands::check::run(&link, &cli.config).await,
        Commands::Subnets => wlmerge::commands::subnets::run(&cli.config).await,
        Commands::Version => {
            println!("wlmerge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
