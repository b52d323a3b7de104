//! Configuration management for wlmerge.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional YAML file, and environment variables (the way the job is
//! configured in CI).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::WlmergeError;
use crate::fetcher::FetchSettings;
use crate::identity::DedupStrategy;
use crate::output::OutputKind;
use crate::renumber::{Renumberer, DEFAULT_WATERMARK};
use crate::validation::{
    validate_remote_path, validate_repository, validate_source_url, validate_subnet,
};
use crate::whitelist::{WhitelistSet, DEFAULT_SUBNETS};

pub const DEFAULT_CONFIG_PATH: &str = "wlmerge.yaml";
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "confs";
pub const DEFAULT_SELECTED_FILE: &str = "confs/selected.txt";
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Built-in source lists.
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/zieng2/wl/main/vless_lite.txt",
    "https://raw.githubusercontent.com/zieng2/wl/main/vless_universal.txt",
];

/// Secure string type that zeroizes memory on drop
/// Used for upload tokens and keys
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source URLs serving link lists
    pub sources: Vec<String>,

    /// Directory receiving merged.txt and wl.txt
    pub output_dir: PathBuf,

    /// Hand-curated list rewritten in place (optional file)
    pub selected_file: PathBuf,

    /// Upper bound on concurrent source fetches
    pub max_workers: usize,

    pub fetch: FetchConfig,

    /// Identity axis used for deduplication
    pub dedup: DedupStrategy,

    pub renumber: RenumberConfig,

    /// IPv4 CIDR ranges whose hosts go to wl.txt
    pub whitelist_subnets: Vec<String>,

    pub uploads: UploadsConfig,

    /// Refresh the status section of README.md on the GitHub destination
    pub readme: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            selected_file: PathBuf::from(DEFAULT_SELECTED_FILE),
            max_workers: DEFAULT_MAX_WORKERS,
            fetch: FetchConfig::default(),
            dedup: DedupStrategy::default(),
            renumber: RenumberConfig::default(),
            whitelist_subnets: DEFAULT_SUBNETS.iter().map(|s| s.to_string()).collect(),
            uploads: UploadsConfig::default(),
            readme: true,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, apply environment overrides, validate.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            Self::default()
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MAX_WORKERS") {
            self.max_workers = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid MAX_WORKERS: {}", v))?;
        }
        if let Some(v) = get("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SELECTED_FILE") {
            self.selected_file = PathBuf::from(v);
        }
        if let Some(v) = get("SOURCES") {
            self.sources = v
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("DEDUP_STRATEGY") {
            self.dedup = v.parse().map_err(WlmergeError::Config)?;
        }
        if let Some(v) = get("RENUMBER") {
            self.renumber.enabled = parse_bool(&v)
                .ok_or_else(|| WlmergeError::Config(format!("Invalid RENUMBER: {}", v)))?;
        }
        if let Some(v) = get("WATERMARK") {
            self.renumber.watermark = v;
        }

        // GitHub is enabled by a token; the repository is always set in CI
        if let Some(token) = get("MY_TOKEN") {
            self.uploads.github.get_or_insert_with(Default::default).token = token.into();
        }
        if let Some(github) = self.uploads.github.as_mut() {
            if let Some(v) = get("GITHUB_REPOSITORY") {
                github.repository = v;
            }
            if let Some(v) = get("GITHUB_BRANCH") {
                github.branch = v;
            }
        }

        if let Some(bucket) = get("S3_BUCKET") {
            self.uploads.s3.get_or_insert_with(Default::default).bucket = bucket;
        }
        if let Some(s3) = self.uploads.s3.as_mut() {
            if let Some(v) = get("S3_ENDPOINT") {
                s3.endpoint = v;
            }
            if let Some(v) = get("S3_REGION") {
                s3.region = v;
            }
            if let Some(v) = get("S3_ACCESS_KEY_ID") {
                s3.access_key_id = v.into();
            }
            if let Some(v) = get("S3_SECRET_ACCESS_KEY") {
                s3.secret_access_key = v.into();
            }
            if let Some(v) = get("S3_PREFIX") {
                s3.prefix = v;
            }
        }

        if let Some(url) = get("GITEA_URL") {
            self.uploads.gitea.get_or_insert_with(Default::default).url = url;
        }
        if let Some(gitea) = self.uploads.gitea.as_mut() {
            if let Some(v) = get("GITEA_TOKEN") {
                gitea.token = v.into();
            }
            if let Some(v) = get("GITEA_REPOSITORY") {
                gitea.repository = v;
            }
            if let Some(v) = get("GITEA_BRANCH") {
                gitea.branch = v;
            }
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }
        if self.fetch.max_attempts == 0 {
            anyhow::bail!("fetch.max_attempts must be at least 1");
        }
        if self.fetch.timeout_secs == 0 || self.fetch.source_timeout_secs == 0 {
            anyhow::bail!("fetch timeouts must be greater than zero");
        }

        for source in &self.sources {
            validate_source_url(source)?;
        }
        for subnet in &self.whitelist_subnets {
            validate_subnet(subnet)?;
        }

        if self.renumber.enabled && self.renumber.watermark.trim().is_empty() {
            anyhow::bail!("renumber.watermark must not be empty when renumbering is enabled");
        }

        self.uploads.validate()
    }

    pub fn whitelist(&self) -> Result<WhitelistSet> {
        WhitelistSet::parse(&self.whitelist_subnets)
    }

    /// The renumberer to use, or `None` when renumbering is disabled.
    pub fn renumberer(&self) -> Option<Renumberer> {
        self.renumber
            .enabled
            .then(|| Renumberer::new(self.renumber.watermark.clone()))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings::from_config(&self.fetch, self.max_workers)
    }

    /// Path of an output file inside the remote stores.
    pub fn remote_path(&self, kind: OutputKind) -> String {
        self.uploads.remote_path(kind.file_name())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-attempt request timeout
    pub timeout_secs: u64,
    /// Deadline for all attempts of one source
    pub source_timeout_secs: u64,
    pub max_attempts: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            source_timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenumberConfig {
    pub enabled: bool,
    pub watermark: String,
}

impl Default for RenumberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watermark: DEFAULT_WATERMARK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Directory inside each remote store for the output files
    pub remote_dir: String,
    pub github: Option<GitHubConfig>,
    pub s3: Option<S3Config>,
    pub gitea: Option<GiteaConfig>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            remote_dir: DEFAULT_OUTPUT_DIR.to_string(),
            github: None,
            s3: None,
            gitea: None,
        }
    }
}

impl UploadsConfig {
    pub fn is_empty(&self) -> bool {
        self.github.is_none() && self.s3.is_none() && self.gitea.is_none()
    }

    pub fn remote_path(&self, file_name: &str) -> String {
        let dir = self.remote_dir.trim_matches('/');
        if dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", dir, file_name)
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.remote_dir.trim_matches('/').is_empty() {
            validate_remote_path(self.remote_dir.trim_matches('/'))?;
        }

        if let Some(github) = &self.github {
            validate_repository(&github.repository).context("Invalid GitHub upload settings")?;
            if github.token.is_empty() {
                anyhow::bail!("GitHub upload requires a token (MY_TOKEN)");
            }
            if github.branch.is_empty() {
                anyhow::bail!("GitHub upload requires a branch");
            }
            if !github.api_url.starts_with("https://") {
                anyhow::bail!("GitHub API URL must use HTTPS: {}", github.api_url);
            }
        }

        if let Some(gitea) = &self.gitea {
            validate_source_url(&gitea.url).context("Invalid Gitea URL")?;
            validate_repository(&gitea.repository).context("Invalid Gitea upload settings")?;
            if gitea.token.is_empty() {
                anyhow::bail!("Gitea upload requires a token (GITEA_TOKEN)");
            }
        }

        if let Some(s3) = &self.s3 {
            validate_source_url(&s3.endpoint).context("Invalid S3 endpoint")?;
            if s3.bucket.is_empty() || s3.bucket.contains('/') {
                anyhow::bail!("Invalid S3 bucket name: {:?}", s3.bucket);
            }
            if s3.access_key_id.is_empty() || s3.secret_access_key.is_empty() {
                anyhow::bail!("S3 upload requires S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY");
            }
            let prefix = s3.prefix.trim_matches('/');
            if !prefix.is_empty() {
                validate_remote_path(prefix).context("Invalid S3 prefix")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// `owner/name`
    pub repository: String,
    pub branch: String,
    /// Token can be set directly or via MY_TOKEN env var
    /// Memory is securely zeroed when dropped
    pub token: SecureString,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            branch: "main".to_string(),
            token: SecureString::default(),
            api_url: GITHUB_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GiteaConfig {
    /// Base URL of the instance, e.g. `https://codeberg.org`
    pub url: String,
    pub repository: String,
    pub branch: String,
    pub token: SecureString,
}

impl Default for GiteaConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            repository: String::new(),
            branch: "main".to_string(),
            token: SecureString::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: SecureString,
    pub secret_access_key: SecureString,
    /// Key prefix inside the bucket
    pub prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: SecureString::default(),
            secret_access_key: SecureString::default(),
            prefix: String::new(),
        }
    }
}
