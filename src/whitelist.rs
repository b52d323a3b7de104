//! Whitelist subnet classification.
//!
//! A link is whitelisted when its extracted host is a literal IPv4 address
//! inside one of the configured CIDR ranges. Domain names are never
//! resolved, so they are never whitelisted.

use anyhow::Result;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::identity::extract_host_port;
use crate::validation::validate_subnet;

/// Default whitelist: regional hosting and cloud provider ranges.
pub const DEFAULT_SUBNETS: &[&str] = &[
    // Mail.ru / VK group
    "95.163.0.0/16",
    "95.142.192.0/20",
    "87.240.128.0/18",
    "93.186.224.0/20",
    "185.32.248.0/22",
    "217.20.144.0/20",
    "5.61.16.0/21",
    "94.100.176.0/20",
    "128.140.168.0/21",
    "178.22.88.0/21",
    "89.208.84.0/22",
    "146.185.208.0/22",
    // Yandex
    "5.45.192.0/18",
    "5.255.192.0/18",
    "37.9.64.0/18",
    "37.140.128.0/18",
    "77.88.0.0/18",
    "84.252.160.0/19",
    "87.250.224.0/19",
    "93.158.128.0/18",
    "95.108.128.0/17",
    "141.8.128.0/18",
    "178.154.128.0/18",
    "213.180.192.0/19",
    // Yandex Cloud
    "51.250.0.0/17",
    "84.201.128.0/18",
    "158.160.0.0/16",
];

/// Immutable set of whitelisted IPv4 networks.
#[derive(Debug, Clone)]
pub struct WhitelistSet {
    /// Aggregated (merged) networks used for lookups.
    nets: Vec<Ipv4Net>,
    /// Number of ranges as configured, before aggregation.
    configured: usize,
}

impl WhitelistSet {
    /// Build a set from networks. Overlapping and adjacent ranges are merged;
    /// membership is unchanged.
    pub fn new(nets: Vec<Ipv4Net>) -> Self {
        let configured = nets.len();
        Self {
            nets: Ipv4Net::aggregate(&nets),
            configured,
        }
    }

    /// Parse CIDR strings (a bare address counts as a /32).
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let nets = entries
            .iter()
            .map(|entry| validate_subnet(entry.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(nets))
    }

    pub fn from_defaults() -> Self {
        let nets = DEFAULT_SUBNETS
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        Self::new(nets)
    }

    /// Number of ranges as configured.
    pub fn len(&self) -> usize {
        self.configured
    }

    pub fn is_empty(&self) -> bool {
        self.configured == 0
    }

    /// Networks after aggregation.
    pub fn aggregated(&self) -> &[Ipv4Net] {
        &self.nets
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.nets.iter().any(|net| net.contains(&ip))
    }

    /// True iff `host` is a dotted-quad IPv4 address inside the set.
    pub fn is_ip_in_subnets(&self, host: &str) -> bool {
        host.trim()
            .parse::<Ipv4Addr>()
            .map(|ip| self.contains(ip))
            .unwrap_or(false)
    }

    /// True iff the link's extracted host is a whitelisted IPv4 address.
    pub fn is_whitelisted(&self, link: &str) -> bool {
        extract_host_port(link)
            .map(|endpoint| self.is_ip_in_subnets(&endpoint.host))
            .unwrap_or(false)
    }
}

impl Default for WhitelistSet {
    fn default() -> Self {
        Self::from_defaults()
    }
}
