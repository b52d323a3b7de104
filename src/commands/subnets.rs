//! Subnets command implementation.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::whitelist::WhitelistSet;

/// Run the subnets command
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path)?;
    let whitelist = config.whitelist()?;
    for line in render(&config.whitelist_subnets, &whitelist) {
        println!("{}", line);
    }
    Ok(())
}

fn render(configured: &[String], whitelist: &WhitelistSet) -> Vec<String> {
    let mut lines = vec![format!("Whitelist subnets ({} configured):", configured.len())];
    lines.extend(configured.iter().map(|s| format!("  {}", s)));

    let aggregated = whitelist.aggregated();
    if aggregated.len() != configured.len() {
        lines.push(String::new());
        lines.push(format!("Aggregated to {} ranges:", aggregated.len()));
        lines.extend(aggregated.iter().map(|net| format!("  {}", net)));
    }

    lines
}
