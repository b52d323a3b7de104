//! Identity keys used to decide whether two links denote the same server.
//!
//! Two axes are available:
//! - a coarse `(host, port)` key from [`extract_host_port`], a best-effort
//!   layered extraction that tolerates any link shape;
//! - a fine per-protocol parameter key from [`generate_config_key`], built
//!   from credentials and TLS/transport parameters, ignoring display names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::LinkError;
use crate::link::{decode_vmess, split_fragment, value_to_string, Protocol, UriLink};

/// Separator between parameter-key components.
const KEY_SEPARATOR: &str = "|";

/// Key prefix length for protocols without a structured key.
const OPAQUE_KEY_CHARS: usize = 200;

/// Key prefix length when structured key extraction fails.
const FALLBACK_KEY_CHARS: usize = 100;

const DEFAULT_TLS_PORT: u16 = 443;

const VLESS_KEY_PARAMS: &[&str] = &[
    "security",
    "sni",
    "sid",
    "pbk",
    "type",
    "flow",
    "fp",
    "encryption",
];

const TROJAN_KEY_PARAMS: &[&str] = &["security", "sni", "type", "flow", "fp"];

/// vmess object fields that identify a server. `ps` (display name) is left
/// out so renumbered copies of one server still collide.
const VMESS_KEY_FIELDS: &[&str] = &[
    "id", "add", "port", "net", "host", "path", "tls", "sni", "type",
];

/// Patterns tried in order; first one that yields a valid port wins.
static HOST_PORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)@([A-Za-z0-9._-]+):(\d{1,5})",
        r"(?i)host=([A-Za-z0-9._-]+).*?port=(\d{1,5})",
        r"(?i)address=([A-Za-z0-9._-]+).*?port=(\d{1,5})",
        r"(?i)//([A-Za-z0-9._-]+):(\d{1,5})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static IPV4_PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})").expect("valid regex")
});

static ANY_HOST_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9._-]+):(\d{1,5})").expect("valid regex"));

/// Server endpoint extracted from a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Which identity axis deduplication uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupStrategy {
    /// One link per `(host, port)`.
    HostPort,
    /// One link per credential + transport parameter set.
    #[default]
    Params,
}

impl FromStr for DedupStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host-port" | "hostport" | "host_port" => Ok(DedupStrategy::HostPort),
            "params" | "param" => Ok(DedupStrategy::Params),
            other => Err(format!(
                "Invalid dedup strategy '{}'. Valid values: host-port, params",
                other
            )),
        }
    }
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupStrategy::HostPort => f.write_str("host-port"),
            DedupStrategy::Params => f.write_str("params"),
        }
    }
}

/// Identity key of a link under one [`DedupStrategy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    HostPort { host: String, port: u16 },
    Param(String),
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupKey::HostPort { host, port } => write!(f, "{}:{}", host, port),
            DedupKey::Param(key) => f.write_str(key),
        }
    }
}

/// Identity key for `link`, or `None` when no endpoint can be extracted.
///
/// Links without an endpoint are never deduplicated on identity grounds.
pub fn identity_key(link: &str, strategy: DedupStrategy) -> Option<DedupKey> {
    let endpoint = extract_host_port(link)?;
    Some(match strategy {
        DedupStrategy::HostPort => DedupKey::HostPort {
            host: endpoint.host.to_lowercase(),
            port: endpoint.port,
        },
        DedupStrategy::Params => DedupKey::Param(generate_config_key(link)),
    })
}

/// Best-effort `(host, port)` extraction.
///
/// Tries, in order: the vmess JSON payload, scheme-aware patterns, a bare
/// IPv4 `ip:port`, and finally any `host:port` token. Returns `None` if
/// nothing matches.
pub fn extract_host_port(link: &str) -> Option<Endpoint> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    if link.starts_with("vmess://") {
        match vmess_endpoint(link) {
            Ok(endpoint) => return Some(endpoint),
            Err(e) => debug!("vmess endpoint fallback: {}", e),
        }
    }

    for pattern in HOST_PORT_PATTERNS.iter() {
        if let Some(endpoint) = capture_endpoint(pattern, link) {
            return Some(endpoint);
        }
    }

    if let Some(endpoint) = capture_endpoint(&IPV4_PORT, link) {
        return Some(endpoint);
    }

    let caps = ANY_HOST_PORT.captures(link)?;
    let host = caps.get(1)?.as_str();
    if host.chars().count() > 1 && (host.contains('.') || is_alnum_with_hyphens(host)) {
        let port = parse_port(caps.get(2)?.as_str())?;
        return Some(Endpoint {
            host: host.to_string(),
            port,
        });
    }

    None
}

/// Parameter key that is stable across cosmetic changes (display name,
/// surrounding whitespace) and distinct for different credentials or
/// transport settings.
pub fn generate_config_key(link: &str) -> String {
    let link = link.trim();
    match structured_key(link) {
        Ok(key) => key,
        Err(e) => {
            debug!("config key fallback for {}: {}", prefix(link, 40), e);
            prefix(link, FALLBACK_KEY_CHARS)
        }
    }
}

fn structured_key(link: &str) -> Result<String, LinkError> {
    match Protocol::detect(link) {
        Protocol::Vless => uri_key(link, VLESS_KEY_PARAMS),
        Protocol::Trojan => uri_key(link, TROJAN_KEY_PARAMS),
        Protocol::Vmess => vmess_key(&decode_vmess(link)?),
        protocol @ (Protocol::Shadowsocks
        | Protocol::Tuic
        | Protocol::Hysteria
        | Protocol::Hysteria2) => {
            // Display name excluded
            let (base, _) = split_fragment(link, protocol);
            Ok(prefix(base, OPAQUE_KEY_CHARS))
        }
        _ => Ok(prefix(link, OPAQUE_KEY_CHARS)),
    }
}

fn uri_key(link: &str, params: &[&str]) -> Result<String, LinkError> {
    let uri = UriLink::parse(link)?;
    let mut parts = vec![
        uri.credential.clone(),
        uri.host.clone().unwrap_or_default(),
        uri.port.unwrap_or(DEFAULT_TLS_PORT).to_string(),
    ];
    parts.extend(
        params
            .iter()
            .map(|name| uri.param(name).unwrap_or_default().to_string()),
    );
    Ok(join_non_empty(parts))
}

fn vmess_key(map: &Map<String, Value>) -> Result<String, LinkError> {
    let parts: Vec<String> = VMESS_KEY_FIELDS
        .iter()
        .map(|field| map.get(*field).and_then(value_to_string).unwrap_or_default())
        .collect();
    let key = join_non_empty(parts);
    if key.is_empty() {
        return Err(LinkError::MissingField("id"));
    }
    Ok(key)
}

fn vmess_endpoint(link: &str) -> Result<Endpoint, LinkError> {
    let map = decode_vmess(link)?;
    let host = ["add", "host", "ip"]
        .iter()
        .filter_map(|field| map.get(*field))
        .find_map(truthy_string)
        .ok_or(LinkError::MissingField("add"))?;
    let port = map
        .get("port")
        .ok_or(LinkError::MissingField("port"))
        .and_then(value_to_port)?;
    Ok(Endpoint { host, port })
}

fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_port(value: &Value) -> Result<u16, LinkError> {
    let port = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    port.and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| LinkError::InvalidPort(value.to_string()))
}

fn capture_endpoint(pattern: &Regex, link: &str) -> Option<Endpoint> {
    let caps = pattern.captures(link)?;
    let port = parse_port(caps.get(2)?.as_str())?;
    Some(Endpoint {
        host: caps.get(1)?.as_str().to_string(),
        port,
    })
}

fn parse_port(digits: &str) -> Option<u16> {
    digits.parse::<u16>().ok().filter(|p| *p != 0)
}

fn is_alnum_with_hyphens(host: &str) -> bool {
    let stripped: String = host.chars().filter(|c| *c != '.' && *c != '-').collect();
    !stripped.is_empty() && stripped.chars().all(char::is_alphanumeric)
}

fn join_non_empty(parts: Vec<String>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// First `max_chars` characters of `s`.
fn prefix(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
