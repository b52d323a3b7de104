//! Repository contents APIs (GitHub and Gitea/Forgejo).
//!
//! Both expose `repos/{owner}/{name}/contents/{path}`: a GET returns the
//! current blob sha and base64 content, a write carries the new base64
//! content plus the old sha when replacing a file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{encode_path, UploadOutcome, Uploader};
use crate::config::{GitHubConfig, GiteaConfig, SecureString};
use crate::link::decode_base64_padded;
use crate::utils::{format_timestamp, moscow_now, truncate};

/// Which contents API dialect to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHost {
    GitHub,
    Gitea,
}

impl GitHost {
    fn auth_header(self, token: &str) -> String {
        match self {
            GitHost::GitHub => format!("Bearer {}", token),
            GitHost::Gitea => format!("token {}", token),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Uploader for a repository hosted on GitHub or a Gitea-compatible forge.
pub struct GitContentsUploader {
    host: GitHost,
    client: Client,
    /// API root, e.g. `https://api.github.com` or `https://codeberg.org/api/v1`
    api_base: String,
    repository: String,
    branch: String,
    token: SecureString,
}

impl GitContentsUploader {
    pub fn new(
        host: GitHost,
        api_base: &str,
        repository: &str,
        branch: &str,
        token: SecureString,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("wlmerge/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client for uploads")?;
        Ok(Self {
            host,
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            branch: branch.to_string(),
            token,
        })
    }

    pub fn github(config: &GitHubConfig, timeout: Duration) -> Result<Self> {
        Self::new(
            GitHost::GitHub,
            &config.api_url,
            &config.repository,
            &config.branch,
            config.token.clone(),
            timeout,
        )
    }

    pub fn gitea(config: &GiteaConfig, timeout: Duration) -> Result<Self> {
        Self::new(
            GitHost::Gitea,
            &format!("{}/api/v1", config.url.trim_end_matches('/')),
            &config.repository,
            &config.branch,
            config.token.clone(),
            timeout,
        )
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn contents_url(&self, remote_path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base,
            self.repository,
            encode_path(remote_path)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(
            reqwest::header::AUTHORIZATION,
            self.host.auth_header(self.token.as_str()),
        );
        match self.host {
            GitHost::GitHub => request.header(reqwest::header::ACCEPT, "application/vnd.github+json"),
            GitHost::Gitea => request.header(reqwest::header::ACCEPT, "application/json"),
        }
    }

    /// Existing blob sha and decoded content, or `None` if the file is absent.
    async fn get_entry(&self, remote_path: &str) -> Result<Option<(String, String)>> {
        let response = self
            .authorized(self.client.get(self.contents_url(remote_path)))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to query {}", remote_path))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            // Don't log response body as it may contain sensitive info
            anyhow::bail!("{} returned {} for {}", self.name(), status, remote_path);
        }

        let entry: ContentsEntry = response
            .json()
            .await
            .context("Failed to parse contents response")?;
        let content = match entry.content.as_deref() {
            Some(encoded) => decode_base64_padded(encoded)?,
            None => String::new(),
        };
        Ok(Some((entry.sha, content)))
    }

    async fn write(&self, content: &str, remote_path: &str, sha: Option<&str>) -> Result<()> {
        let stamp = format_timestamp(&moscow_now());
        let message = match sha {
            Some(_) => format!("Auto-update: {}", stamp),
            None => format!("Initial upload: {}", stamp),
        };
        let body = WriteRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha,
        };

        let url = self.contents_url(remote_path);
        // Gitea creates with POST; GitHub uses PUT for both
        let request = match (self.host, sha) {
            (GitHost::Gitea, None) => self.client.post(url),
            _ => self.client.put(url),
        };

        let response = self
            .authorized(request)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", remote_path))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} returned {}: {}",
                self.name(),
                status,
                truncate(detail.trim(), 100)
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Uploader for GitContentsUploader {
    fn name(&self) -> String {
        match self.host {
            GitHost::GitHub => format!("GitHub ({})", self.repository),
            GitHost::Gitea => format!("Gitea ({})", self.repository),
        }
    }

    async fn upload(&self, content: &str, remote_path: &str) -> Result<UploadOutcome> {
        match self.get_entry(remote_path).await? {
            Some((_, current)) if current == content => {
                debug!("{} unchanged on {}", remote_path, self.name());
                Ok(UploadOutcome::Unchanged)
            }
            Some((sha, _)) => {
                self.write(content, remote_path, Some(&sha)).await?;
                Ok(UploadOutcome::Updated)
            }
            None => {
                self.write(content, remote_path, None).await?;
                Ok(UploadOutcome::Created)
            }
        }
    }

    async fn fetch(&self, remote_path: &str) -> Result<Option<String>> {
        Ok(self
            .get_entry(remote_path)
            .await?
            .map(|(_, content)| content))
    }
}
