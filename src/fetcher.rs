//! HTTP fetcher for source lists.
//!
//! Each source is fetched through an ordered ladder of [`AttemptPolicy`]s
//! that progressively relax trust: verified TLS, then unverified TLS, then
//! plain HTTP. Sources are fetched concurrently; a failed or timed-out
//! source contributes no candidates and never aborts the run.

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;
use crate::link::extract_candidates;
use crate::runlog::RunLog;
use crate::utils::{format_count, source_label, truncate};

/// Browser user agent; some mirrors refuse unknown clients.
pub const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                             AppleWebKit/537.36 (KHTML, like Gecko) \
                             Chrome/138.0.0.0 Safari/537.36";

/// Maximum size per source file (10 MB)
const MAX_SOURCE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum total size for all downloads combined (50 MB)
const MAX_TOTAL_SIZE: usize = 50 * 1024 * 1024;

const RETRY_BASE_DELAY_MS: u64 = 500;

/// How one fetch attempt is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    pub verify_tls: bool,
    /// Replace an `https` scheme with this one.
    pub scheme_override: Option<&'static str>,
}

impl AttemptPolicy {
    pub const VERIFIED: Self = Self {
        verify_tls: true,
        scheme_override: None,
    };
    pub const UNVERIFIED: Self = Self {
        verify_tls: false,
        scheme_override: None,
    };
    pub const PLAINTEXT: Self = Self {
        verify_tls: false,
        scheme_override: Some("http"),
    };

    const DEFAULT_LADDER: [Self; 3] = [Self::VERIFIED, Self::UNVERIFIED, Self::PLAINTEXT];

    /// The first `max_attempts` policies; attempts past the third repeat
    /// the last one.
    pub fn ladder(max_attempts: usize) -> Vec<Self> {
        (0..max_attempts)
            .map(|i| Self::DEFAULT_LADDER[i.min(Self::DEFAULT_LADDER.len() - 1)])
            .collect()
    }

    /// The URL actually requested under this policy.
    pub fn apply(&self, url: &str) -> String {
        let Some(scheme) = self.scheme_override else {
            return url.to_string();
        };
        match Url::parse(url) {
            Ok(mut parsed) if parsed.scheme() == "https" => {
                if parsed.set_scheme(scheme).is_ok() {
                    parsed.to_string()
                } else {
                    url.to_string()
                }
            }
            _ => url.to_string(),
        }
    }
}

/// Timeouts and limits for a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Deadline for all attempts of one source.
    pub source_timeout: Duration,
    pub max_attempts: usize,
    pub max_workers: usize,
    pub retry_base_delay: Duration,
}

impl FetchSettings {
    pub fn from_config(fetch: &FetchConfig, max_workers: usize) -> Self {
        Self {
            timeout: Duration::from_secs(fetch.timeout_secs),
            source_timeout: Duration::from_secs(fetch.source_timeout_secs),
            max_attempts: fetch.max_attempts,
            max_workers,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default(), crate::config::DEFAULT_MAX_WORKERS)
    }
}

/// Outcome of fetching one source.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub url: String,
    pub label: String,
    /// Candidate links in source line order.
    pub candidates: Vec<String>,
    pub bytes: usize,
    /// Set when the source contributed nothing because of an error.
    pub error: Option<String>,
}

impl SourceResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// HTTP client pair (verifying and non-verifying) for fetching sources
pub struct Fetcher {
    verified: Client,
    unverified: Client,
    settings: FetchSettings,
    /// Cumulative download size tracker (thread-safe for concurrent fetches)
    total_downloaded: AtomicUsize,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let verified = Client::builder()
            .timeout(settings.timeout)
            .user_agent(CHROME_UA)
            .build()
            .context("Failed to create HTTP client")?;
        let unverified = Client::builder()
            .timeout(settings.timeout)
            .user_agent(CHROME_UA)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to create non-verifying HTTP client")?;
        Ok(Self {
            verified,
            unverified,
            settings,
            total_downloaded: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Get the total bytes downloaded so far
    pub fn total_downloaded(&self) -> usize {
        self.total_downloaded.load(Ordering::Relaxed)
    }

    /// Fetch all sources with at most `min(max_workers, sources)` in flight.
    ///
    /// Results arrive in completion order, not source order.
    pub async fn fetch_all(&self, urls: &[String], log: &RunLog) -> Vec<SourceResult> {
        use futures::stream::{self, StreamExt};

        let concurrency = self.settings.max_workers.min(urls.len()).max(1);
        debug!("Fetching {} sources with {} workers", urls.len(), concurrency);

        stream::iter(urls.iter().map(|url| self.fetch_source(url, log)))
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Fetch one source and extract its candidates, within the source deadline.
    pub async fn fetch_source(&self, url: &str, log: &RunLog) -> SourceResult {
        let label = source_label(url);
        let mut result = SourceResult {
            url: url.to_string(),
            label: label.clone(),
            candidates: Vec::new(),
            bytes: 0,
            error: None,
        };

        match tokio::time::timeout(self.settings.source_timeout, self.fetch_text(url)).await {
            Ok(Ok(body)) => {
                result.bytes = body.len();
                result.candidates = extract_candidates(&body);
                log.push(format!(
                    "{}: {} configs",
                    label,
                    format_count(result.candidates.len())
                ));
            }
            Ok(Err(e)) => {
                let message = truncate(&format!("{:#}", e), 100);
                log.warn(format!("Failed to fetch {}: {}", url, message));
                result.error = Some(message);
            }
            Err(_) => {
                let message = format!(
                    "timed out after {}s",
                    self.settings.source_timeout.as_secs_f32()
                );
                log.warn(format!("Failed to fetch {}: {}", url, message));
                result.error = Some(message);
            }
        }

        result
    }

    /// Fetch a URL through the attempt ladder.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut last_error = None;

        for (attempt, policy) in AttemptPolicy::ladder(self.settings.max_attempts)
            .into_iter()
            .enumerate()
        {
            if attempt > 0 {
                let delay = self.settings.retry_base_delay * (1u32 << (attempt - 1).min(16));
                debug!("Retry {} after {:?} for {}", attempt, delay, url);
                tokio::time::sleep(delay).await;
            }

            let target = policy.apply(url);
            let client = if policy.verify_tls {
                &self.verified
            } else {
                &self.unverified
            };

            match client.get(&target).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return self.read_body(response).await;
                    }
                    // Any non-success status moves on to the next policy
                    debug!("Attempt {} for {} returned {}", attempt + 1, target, status);
                    last_error = Some(anyhow::anyhow!("HTTP {}", status));
                }
                Err(e) => {
                    debug!("Attempt {} for {} failed: {}", attempt + 1, target, e);
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No fetch attempts configured")))
    }

    /// Read a response body, enforcing per-source and cumulative limits.
    async fn read_body(&self, response: reqwest::Response) -> Result<String> {
        if let Some(content_length) = response.content_length() {
            let content_length = content_length as usize;
            if content_length > MAX_SOURCE_SIZE {
                anyhow::bail!(
                    "Response too large: {} bytes (max: {} bytes)",
                    content_length,
                    MAX_SOURCE_SIZE
                );
            }
            let current_total = self.total_downloaded.load(Ordering::Relaxed);
            if current_total + content_length > MAX_TOTAL_SIZE {
                anyhow::bail!(
                    "Cumulative download limit exceeded: {} + {} > {} bytes",
                    current_total,
                    content_length,
                    MAX_TOTAL_SIZE
                );
            }
        }

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if body.len() > MAX_SOURCE_SIZE {
            anyhow::bail!(
                "Downloaded content too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_SOURCE_SIZE
            );
        }

        let new_total = self
            .total_downloaded
            .fetch_add(body.len(), Ordering::Relaxed)
            + body.len();
        if new_total > MAX_TOTAL_SIZE {
            anyhow::bail!(
                "Cumulative download limit exceeded: {} bytes (max: {} bytes)",
                new_total,
                MAX_TOTAL_SIZE
            );
        }

        Ok(body)
    }
}
