//! Share-link parsing.
//!
//! Turns scraped text into candidate links and candidate links into a
//! [`ParsedLink`]: a protocol tag plus a partially decoded payload. Parsing is
//! total; anything that cannot be decoded is kept as [`Payload::Opaque`].

use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::error::LinkError;

/// Minimum length (exclusive) for a line to be considered a link.
const MIN_LINK_CHARS: usize = 10;

/// Decoder config for scraped payloads: non-zero trailing bits and any
/// padding are accepted.
const LENIENT_DECODE: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_allow_trailing_bits(true)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT_DECODE);

const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT_DECODE);

/// Scheme token anywhere in a blob; used to break glued links apart.
static SCHEME_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(vmess|vless|trojan|ss|ssr|tuic|hysteria|hysteria2)://").expect("valid regex")
});

/// Protocol of a share link, inferred solely from its scheme prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    ShadowsocksR,
    Tuic,
    Hysteria,
    Hysteria2,
    Unknown,
}

impl Protocol {
    /// All protocols with a recognized scheme.
    pub const KNOWN: [Protocol; 8] = [
        Protocol::Vmess,
        Protocol::Vless,
        Protocol::Trojan,
        Protocol::Shadowsocks,
        Protocol::ShadowsocksR,
        Protocol::Tuic,
        Protocol::Hysteria,
        Protocol::Hysteria2,
    ];

    /// Scheme prefix including `://`.
    pub fn scheme(self) -> Option<&'static str> {
        match self {
            Protocol::Vmess => Some("vmess://"),
            Protocol::Vless => Some("vless://"),
            Protocol::Trojan => Some("trojan://"),
            Protocol::Shadowsocks => Some("ss://"),
            Protocol::ShadowsocksR => Some("ssr://"),
            Protocol::Tuic => Some("tuic://"),
            Protocol::Hysteria => Some("hysteria://"),
            Protocol::Hysteria2 => Some("hysteria2://"),
            Protocol::Unknown => None,
        }
    }

    /// Upper-case label used in renumbered display names.
    pub fn label(self) -> &'static str {
        match self {
            Protocol::Vmess => "VMESS",
            Protocol::Vless => "VLESS",
            Protocol::Trojan => "TROJAN",
            Protocol::Shadowsocks => "SS",
            Protocol::ShadowsocksR => "SSR",
            Protocol::Tuic => "TUIC",
            Protocol::Hysteria => "HYSTERIA",
            Protocol::Hysteria2 => "HYSTERIA2",
            Protocol::Unknown => "CONFIG",
        }
    }

    /// Detect the protocol from the scheme prefix of `link`.
    pub fn detect(link: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|p| p.scheme().is_some_and(|s| link.starts_with(s)))
            .unwrap_or(Protocol::Unknown)
    }

    /// Whether the display name is a standard URI fragment (first `#`).
    pub fn has_uri_fragment(self) -> bool {
        matches!(
            self,
            Protocol::Vless | Protocol::Trojan | Protocol::Shadowsocks
        )
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Put every scheme token that follows other content on its own line.
pub fn split_concatenated(text: &str) -> String {
    SCHEME_TOKEN.replace_all(text, "\n${1}://").into_owned()
}

/// Line admission rule for an already trimmed line.
pub fn is_candidate(line: &str) -> bool {
    if line.is_empty() || line.starts_with('#') || line.chars().count() <= MIN_LINK_CHARS {
        return false;
    }
    if Protocol::detect(line) != Protocol::Unknown {
        return true;
    }
    // Scheme-less formats such as `user@host:port:...`
    line.contains('@') && line.matches(':').count() >= 2
}

/// Extract candidate links from a raw text blob, preserving line order.
pub fn extract_candidates(text: &str) -> Vec<String> {
    split_concatenated(text)
        .lines()
        .map(str::trim)
        .filter(|line| is_candidate(line))
        .map(str::to_string)
        .collect()
}

/// Decoded view of a URI-shaped link (vless, trojan, ss, tuic, hysteria).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriLink {
    /// Userinfo: UUID for vless, password for trojan, method blob for ss.
    pub credential: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub params: Vec<(String, String)>,
    pub fragment: Option<String>,
}

impl UriLink {
    pub fn parse(link: &str) -> Result<Self, LinkError> {
        let url = Url::parse(link.trim())?;
        let host = url
            .host_str()
            .map(|h| h.trim_matches(|c: char| c == '[' || c == ']').to_ascii_lowercase())
            .filter(|h| !h.is_empty());
        Ok(Self {
            credential: url.username().to_string(),
            host,
            port: url.port(),
            params: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            fragment: url.fragment().map(percent_decode),
        })
    }

    /// First value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Protocol-specific payload of a [`ParsedLink`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// Decoded vmess JSON object.
    Vmess(Map<String, Value>),
    Uri(UriLink),
    /// Could not be decoded, or the protocol is not URI-shaped.
    Opaque,
}

/// A candidate link together with its decoded payload.
#[derive(Debug, Clone)]
pub struct ParsedLink {
    raw: String,
    protocol: Protocol,
    payload: Payload,
}

impl ParsedLink {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let protocol = Protocol::detect(raw);
        let payload = match protocol {
            Protocol::Vmess => decode_vmess(raw).map(Payload::Vmess).unwrap_or(Payload::Opaque),
            Protocol::ShadowsocksR | Protocol::Unknown => Payload::Opaque,
            _ => UriLink::parse(raw).map(Payload::Uri).unwrap_or(Payload::Opaque),
        };
        Self {
            raw: raw.to_string(),
            protocol,
            payload,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Endpoint as seen by the identity extractor.
    pub fn endpoint(&self) -> Option<crate::identity::Endpoint> {
        crate::identity::extract_host_port(&self.raw)
    }

    /// Current display name, percent-decoded.
    pub fn display_name(&self) -> Option<String> {
        match &self.payload {
            Payload::Vmess(map) => map.get("ps").and_then(value_to_string),
            Payload::Uri(uri) => uri.fragment.clone(),
            Payload::Opaque => {
                let (_, fragment) = split_fragment(&self.raw, self.protocol);
                fragment.map(percent_decode)
            }
        }
        .filter(|name| !name.is_empty())
    }

    /// Named parameter from the query string or the vmess object.
    pub fn param(&self, name: &str) -> Option<String> {
        match &self.payload {
            Payload::Vmess(map) => map.get(name).and_then(value_to_string),
            Payload::Uri(uri) => uri.param(name).map(str::to_string),
            Payload::Opaque => None,
        }
    }
}

/// Split a link into the part before its display-name fragment and the raw
/// (still percent-encoded) fragment.
pub fn split_fragment(link: &str, protocol: Protocol) -> (&str, Option<&str>) {
    let pos = if protocol.has_uri_fragment() {
        link.find('#')
    } else {
        link.rfind('#')
    };
    match pos {
        Some(pos) => (&link[..pos], Some(&link[pos + 1..])),
        None => (link, None),
    }
}

pub fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Base64-decode a payload, padding it to a multiple of 4 first.
///
/// Accepts both the standard and the URL-safe alphabet; invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode_base64_padded(payload: &str) -> Result<String, LinkError> {
    let mut cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let rem = cleaned.len() % 4;
    if rem != 0 {
        cleaned.push_str(&"=".repeat(4 - rem));
    }
    let bytes = match LENIENT_STANDARD.decode(&cleaned) {
        Ok(bytes) => bytes,
        Err(_) => LENIENT_URL_SAFE.decode(&cleaned)?,
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode the JSON object carried by a `vmess://` link.
pub fn decode_vmess(link: &str) -> Result<Map<String, Value>, LinkError> {
    let body = link
        .trim()
        .strip_prefix("vmess://")
        .ok_or(LinkError::UnsupportedScheme)?;
    let text = decode_base64_padded(body)?;
    match serde_json::from_str::<Value>(text.trim())? {
        Value::Object(map) => Ok(map),
        _ => Err(LinkError::NotAnObject),
    }
}

/// Re-encode a vmess object into a `vmess://` link.
pub fn encode_vmess(map: &Map<String, Value>) -> Result<String, LinkError> {
    let json = serde_json::to_string(map)?;
    Ok(format!("vmess://{}", STANDARD.encode(json)))
}

/// String form of a scalar JSON value; `None` for null, empty and compound values.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VLESS: &str =
        "vless://11111111-2222-3333-4444-555555555555@1.2.3.4:443?security=reality&sni=ya.ru&type=tcp#%F0%9F%87%B7%F0%9F%87%BA%20Moscow";

    #[test]
    fn test_protocol_detect() {
        assert_eq!(Protocol::detect("vmess://abc"), Protocol::Vmess);
        assert_eq!(Protocol::detect("vless://abc"), Protocol::Vless);
        assert_eq!(Protocol::detect("trojan://abc"), Protocol::Trojan);
        assert_eq!(Protocol::detect("ss://abc"), Protocol::Shadowsocks);
        assert_eq!(Protocol::detect("ssr://abc"), Protocol::ShadowsocksR);
        assert_eq!(Protocol::detect("tuic://abc"), Protocol::Tuic);
        assert_eq!(Protocol::detect("hysteria://abc"), Protocol::Hysteria);
        assert_eq!(Protocol::detect("hysteria2://abc"), Protocol::Hysteria2);
        assert_eq!(Protocol::detect("http://abc"), Protocol::Unknown);
        assert_eq!(Protocol::detect("VLESS://abc"), Protocol::Unknown);
    }

    #[test]
    fn test_split_concatenated() {
        let glued = "vless://a@1.1.1.1:443#xvmess://eyJ9trojan://p@h.com:443";
        let split = split_concatenated(glued);
        let lines: Vec<&str> = split.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(
            lines,
            vec!["vless://a@1.1.1.1:443#x", "vmess://eyJ9", "trojan://p@h.com:443"]
        );
    }

    #[test]
    fn test_split_keeps_ssr_and_hysteria2_whole() {
        let split = split_concatenated("ssr://abcdefhysteria2://p@h:1");
        let lines: Vec<&str> = split.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["ssr://abcdef", "hysteria2://p@h:1"]);
    }

    #[test]
    fn test_is_candidate() {
        assert!(is_candidate("vless://uuid@1.2.3.4:443"));
        assert!(is_candidate("user@example.com:443:extra"));
        assert!(!is_candidate("# vless://uuid@1.2.3.4:443"));
        assert!(!is_candidate("ss://short"));
        assert!(!is_candidate("just some plain text here"));
        assert!(!is_candidate("user@example.com:443"));
        assert!(!is_candidate(""));
    }

    #[test]
    fn test_extract_candidates() {
        let blob = "# header\n\n  vless://uuid@1.2.3.4:443#a  \nnot a link\r\ntrojan://pw@host.example:443vmess://eyJhZGQiOiIxIn0=\n";
        let links = extract_candidates(blob);
        assert_eq!(
            links,
            vec![
                "vless://uuid@1.2.3.4:443#a",
                "trojan://pw@host.example:443",
                "vmess://eyJhZGQiOiIxIn0=",
            ]
        );
    }

    #[test]
    fn test_parse_vless() {
        let parsed = ParsedLink::parse(VLESS);
        assert_eq!(parsed.protocol(), Protocol::Vless);
        match parsed.payload() {
            Payload::Uri(uri) => {
                assert_eq!(uri.credential, "11111111-2222-3333-4444-555555555555");
                assert_eq!(uri.host.as_deref(), Some("1.2.3.4"));
                assert_eq!(uri.port, Some(443));
                assert_eq!(uri.param("security"), Some("reality"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(parsed.display_name().as_deref(), Some("🇷🇺 Moscow"));
        assert_eq!(parsed.param("sni").as_deref(), Some("ya.ru"));
    }

    #[test]
    fn test_parse_vmess() {
        let json = r#"{"v":"2","ps":"node","add":"example.com","port":"8443","id":"abc"}"#;
        let link = format!("vmess://{}", STANDARD.encode(json));
        let parsed = ParsedLink::parse(&link);
        assert_eq!(parsed.protocol(), Protocol::Vmess);
        assert!(matches!(parsed.payload(), Payload::Vmess(_)));
        assert_eq!(parsed.display_name().as_deref(), Some("node"));
        assert_eq!(parsed.param("port").as_deref(), Some("8443"));
    }

    #[test]
    fn test_parse_malformed_is_opaque() {
        let parsed = ParsedLink::parse("vmess://!!!not-base64!!!");
        assert!(matches!(parsed.payload(), Payload::Opaque));
        assert_eq!(parsed.protocol(), Protocol::Vmess);

        let parsed = ParsedLink::parse("vless://uuid@host:99999");
        assert!(matches!(parsed.payload(), Payload::Opaque));
    }

    #[test]
    fn test_decode_base64_padding() {
        // "hello" without padding
        assert_eq!(decode_base64_padded("aGVsbG8").unwrap(), "hello");
        assert_eq!(decode_base64_padded("aGVsbG8=").unwrap(), "hello");
        assert!(decode_base64_padded("@@@@").is_err());
    }

    #[test]
    fn test_decode_base64_trailing_bits() {
        // Last symbol carries non-zero bits past the final byte
        assert_eq!(decode_base64_padded("aGVsbG9").unwrap(), "hello");
        assert_eq!(decode_base64_padded("aGVsbG9=").unwrap(), "hello");
        assert_eq!(decode_base64_padded("aGVsbG-").unwrap(), "hello");
    }

    #[test]
    fn test_decode_vmess_trailing_bits() {
        let link = "vmess://eyJhZGQiOiI5NS4xNjMuMS4xIiwicG9ydCI6IjQ0MyIsImlkIjoiYWJjIn1";
        let map = decode_vmess(link).unwrap();
        assert_eq!(map["add"], "95.163.1.1");
        assert_eq!(map["id"], "abc");
    }

    #[test]
    fn test_vmess_roundtrip_preserves_key_order() {
        let json = r#"{"v":"2","ps":"x","add":"a.com","port":443}"#;
        let link = format!("vmess://{}", STANDARD.encode(json));
        let map = decode_vmess(&link).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["v", "ps", "add", "port"]);
        assert_eq!(encode_vmess(&map).unwrap(), link);
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(
            split_fragment("vless://a@b:1#x#y", Protocol::Vless),
            ("vless://a@b:1", Some("x#y"))
        );
        assert_eq!(
            split_fragment("ssr://abc#x#y", Protocol::ShadowsocksR),
            ("ssr://abc#x", Some("y"))
        );
        assert_eq!(split_fragment("tuic://a@b:1", Protocol::Tuic), ("tuic://a@b:1", None));
    }
}
