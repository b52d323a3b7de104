//! Selected command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::selected::rewrite_selected_file;
use crate::utils::{format_timestamp, moscow_now};

/// Run the selected command: rewrite the selected list in place.
pub async fn run(file: Option<&Path>, config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let path = file.unwrap_or(&config.selected_file);

    let updated = format_timestamp(&moscow_now());
    let renumberer = config.renumberer();

    match rewrite_selected_file(path, config.dedup, renumberer.as_ref(), &updated)? {
        Some(outcome) => {
            info!(
                "{}: {} configs kept, {} duplicates removed",
                path.display(),
                outcome.kept,
                outcome.dropped
            );
        }
        None => warn!("Selected file not found: {}", path.display()),
    }

    Ok(())
}
