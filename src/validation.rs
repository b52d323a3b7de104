//! Centralized validation functions for wlmerge.
//!
//! This module provides unified validation for:
//! - Source URLs
//! - Whitelist subnets
//! - Remote upload paths and repository names

use anyhow::{bail, Context, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use url::Url;

/// Validate a source URL: must parse and use `http` or `https` with a host.
///
/// # Examples
/// ```
/// use wlmerge::validation::validate_source_url;
/// assert!(validate_source_url("https://raw.githubusercontent.com/a/b/main/c.txt").is_ok());
/// assert!(validate_source_url("ftp://example.com/list").is_err());
/// assert!(validate_source_url("not a url").is_err());
/// ```
pub fn validate_source_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid source URL: {}", url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Source URL must use http or https: {}", url);
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        bail!("Source URL has no host: {}", url);
    }
    Ok(parsed)
}

/// Validate an IPv4 CIDR or address string and return the parsed network.
///
/// A plain address (without /prefix) becomes a /32.
///
/// # Examples
/// ```
/// use wlmerge::validation::validate_subnet;
/// assert!(validate_subnet("95.163.0.0/16").is_ok());
/// assert!(validate_subnet("1.2.3.4").is_ok());
/// assert!(validate_subnet("2001:db8::/32").is_err());
/// ```
pub fn validate_subnet(entry: &str) -> Result<Ipv4Net> {
    let entry = entry.trim();
    if entry.contains('/') {
        entry
            .parse::<Ipv4Net>()
            .map_err(|_| anyhow::anyhow!("Invalid whitelist subnet: {}", entry))
    } else {
        entry
            .parse::<Ipv4Addr>()
            .map(Ipv4Net::from)
            .map_err(|_| anyhow::anyhow!("Invalid whitelist address: {}", entry))
    }
}

/// Validate a path inside a remote store: relative, no `..`, no backslashes
/// or control characters.
///
/// # Examples
/// ```
/// use wlmerge::validation::validate_remote_path;
/// assert!(validate_remote_path("confs/merged.txt").is_ok());
/// assert!(validate_remote_path("/etc/passwd").is_err());
/// assert!(validate_remote_path("confs/../x").is_err());
/// ```
pub fn validate_remote_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("Remote path is empty");
    }
    if path.starts_with('/') {
        bail!("Remote path must be relative: {}", path);
    }
    if path.contains('\\') || path.chars().any(char::is_control) {
        bail!("Remote path contains invalid characters: {:?}", path);
    }
    if path.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        bail!("Remote path contains an invalid segment: {}", path);
    }
    Ok(())
}

/// Validate an `owner/name` repository identifier.
///
/// # Examples
/// ```
/// use wlmerge::validation::validate_repository;
/// assert!(validate_repository("bywarm/wlrusparser").is_ok());
/// assert!(validate_repository("no-slash").is_err());
/// ```
pub fn validate_repository(repo: &str) -> Result<()> {
    let mut parts = repo.split('/');
    let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Repository must be 'owner/name': {}", repo);
    };
    let valid = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
    };
    if !valid(owner) || !valid(name) {
        bail!("Repository contains invalid characters: {}", repo);
    }
    Ok(())
}
