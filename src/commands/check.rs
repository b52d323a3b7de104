//! Check command implementation.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::identity::{extract_host_port, identity_key, DedupStrategy};
use crate::link::{is_candidate, ParsedLink};

/// Run the check command
pub async fn run(link: &str, config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path)?;
    for line in report(link, &config)? {
        println!("{}", line);
    }
    Ok(())
}

/// Lines describing how `link` flows through the pipeline.
pub fn report(link: &str, config: &Config) -> Result<Vec<String>> {
    let link = link.trim();
    if link.is_empty() {
        anyhow::bail!("Link must not be empty");
    }

    let parsed = ParsedLink::parse(link);
    let whitelist = config.whitelist()?;
    let mut lines = vec![String::new()];

    lines.push(format!("Protocol:     {}", parsed.protocol().label()));
    lines.push(format!(
        "Candidate:    {}",
        if is_candidate(link) { "yes" } else { "no" }
    ));
    if let Some(name) = parsed.display_name() {
        lines.push(format!("Name:         {}", name));
    }

    match extract_host_port(link) {
        Some(endpoint) => lines.push(format!("Endpoint:     {}", endpoint)),
        None => lines.push("Endpoint:     none (kept, never deduplicated by identity)".to_string()),
    }

    let host_port = identity_key(link, DedupStrategy::HostPort)
        .map(|key| key.to_string())
        .unwrap_or_else(|| "-".to_string());
    lines.push(format!("Key host-port: {}", host_port));
    let params = identity_key(link, DedupStrategy::Params)
        .map(|key| key.to_string())
        .unwrap_or_else(|| "-".to_string());
    lines.push(format!("Key params:    {}", params));
    lines.push(format!("Active axis:   {}", config.dedup));

    lines.push(format!(
        "Whitelisted:  {}",
        if whitelist.is_whitelisted(link) { "yes" } else { "no" }
    ));

    if let Some(renumberer) = config.renumberer() {
        lines.push(format!("Renumbered:   {}", renumberer.renumber_one(link, 1)));
    }
    lines.push(String::new());

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_whitelisted_vless() {
        let mut config = Config::default();
        config.whitelist_subnets = vec!["95.163.0.0/16".to_string()];
        let lines = report("vless://uuid1@95.163.4.10:443?security=tls#A", &config).unwrap();

        assert!(lines.contains(&"Protocol:     VLESS".to_string()));
        assert!(lines.contains(&"Endpoint:     95.163.4.10:443".to_string()));
        assert!(lines.contains(&"Key host-port: 95.163.4.10:443".to_string()));
        assert!(lines.contains(&"Key params:    uuid1|95.163.4.10|443|tls".to_string()));
        assert!(lines.contains(&"Whitelisted:  yes".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Renumbered:   vless://uuid1@95.163.4.10:443")));
    }

    #[test]
    fn test_report_malformed_vmess() {
        let mut config = Config::default();
        config.renumber.enabled = false;
        let lines = report("vmess://not-base64", &config).unwrap();

        assert!(lines.iter().any(|l| l.starts_with("Endpoint:     none")));
        assert!(lines.contains(&"Key host-port: -".to_string()));
        assert!(lines.contains(&"Key params:    -".to_string()));
        assert!(lines.contains(&"Whitelisted:  no".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("Renumbered")));
    }

    #[test]
    fn test_report_rejects_empty() {
        assert!(report("   ", &Config::default()).is_err());
    }
}
