//! Display-name renumbering.
//!
//! Rewrites each link's cosmetic name to `"{n}. {flag}{LABEL} | {watermark}"`
//! without touching connection parameters. Where the name lives depends on
//! the protocol: the `ps` field of the vmess JSON object, or the URI
//! fragment for everything else.

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::LinkError;
use crate::link::{
    decode_vmess, encode_vmess, percent_decode, split_fragment, value_to_string, ParsedLink,
    Protocol,
};

/// Watermark appended to every renumbered name unless configured otherwise.
pub const DEFAULT_WATERMARK: &str = "TG: @wlrustg";

/// Characters escaped when writing a name back into a URI fragment.
const FRAGMENT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'|');

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.").expect("valid regex"));

const REGIONAL_INDICATORS: std::ops::RangeInclusive<char> = '\u{1F1E6}'..='\u{1F1FF}';

/// Rewrites display names with a sequence number and a fixed watermark.
#[derive(Debug, Clone)]
pub struct Renumberer {
    watermark: String,
}

impl Default for Renumberer {
    fn default() -> Self {
        Self::new(DEFAULT_WATERMARK)
    }
}

impl Renumberer {
    pub fn new(watermark: impl Into<String>) -> Self {
        Self {
            watermark: watermark.into(),
        }
    }

    pub fn watermark(&self) -> &str {
        &self.watermark
    }

    /// Renumber a whole list, 1-indexed by position.
    pub fn renumber(&self, links: &[String]) -> Vec<String> {
        links
            .iter()
            .enumerate()
            .map(|(i, link)| self.renumber_one(link, i + 1))
            .collect()
    }

    /// Renumber one link as entry `number`.
    ///
    /// Links that already carry a leading number and the watermark are
    /// returned unchanged, as is any link whose name cannot be rewritten.
    pub fn renumber_one(&self, link: &str, number: usize) -> String {
        let parsed = ParsedLink::parse(link);
        if self.is_already_numbered(&parsed) {
            return link.to_string();
        }
        match self.rewrite(&parsed, number) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                debug!("renumber skipped for entry {}: {}", number, e);
                link.to_string()
            }
        }
    }

    /// Approximate idempotence check: a leading `N.` plus the watermark.
    pub fn is_already_numbered(&self, parsed: &ParsedLink) -> bool {
        parsed
            .display_name()
            .is_some_and(|name| LEADING_NUMBER.is_match(&name) && name.contains(&self.watermark))
    }

    /// The display name a link gets as entry `number`.
    pub fn format_name(&self, number: usize, flag: Option<&str>, protocol: Protocol) -> String {
        format!(
            "{}. {}{} | {}",
            number,
            flag.unwrap_or_default(),
            protocol.label(),
            self.watermark
        )
    }

    fn rewrite(&self, parsed: &ParsedLink, number: usize) -> Result<String, LinkError> {
        let raw = parsed.raw();
        let protocol = parsed.protocol();

        if protocol == Protocol::Vmess {
            let mut map = decode_vmess(raw)?;
            let flag = map
                .get("ps")
                .and_then(value_to_string)
                .and_then(|name| extract_flag(&name));
            let name = self.format_name(number, flag.as_deref(), protocol);
            map.insert("ps".to_string(), Value::String(name));
            return encode_vmess(&map);
        }

        let (base, fragment) = split_fragment(raw, protocol);
        let flag = fragment.map(percent_decode).and_then(|name| extract_flag(&name));
        let name = self.format_name(number, flag.as_deref(), protocol);
        Ok(format!(
            "{}#{}",
            base,
            utf8_percent_encode(&name, FRAGMENT_ESCAPE)
        ))
    }
}

/// First regional-indicator pair (a country flag emoji) in `name`.
pub fn extract_flag(name: &str) -> Option<String> {
    let chars: Vec<char> = name.chars().collect();
    chars
        .windows(2)
        .find(|pair| REGIONAL_INDICATORS.contains(&pair[0]) && REGIONAL_INDICATORS.contains(&pair[1]))
        .map(|pair| pair.iter().collect())
}
