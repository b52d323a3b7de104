//! Remote destinations for the output files.
//!
//! Every destination implements [`Uploader`]: put content at a path,
//! creating or updating it. [`upload_all`] sends every file to every
//! destination; one failure never blocks the others.

mod git;
mod s3;

use anyhow::Result;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

pub use git::{GitContentsUploader, GitHost};
pub use s3::{sign_v4, S3Uploader, SigningRequest};

use crate::config::UploadsConfig;
use crate::error::WlmergeError;
use crate::runlog::RunLog;

/// Timeout for upload HTTP requests
pub const UPLOAD_TIMEOUT_SECS: u64 = 30;

/// Unreserved characters (RFC 3986) stay as-is in path segments.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// What an upload did to the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Created,
    Updated,
    /// Remote content already matched.
    Unchanged,
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Created => f.write_str("created"),
            UploadOutcome::Updated => f.write_str("updated"),
            UploadOutcome::Unchanged => f.write_str("unchanged"),
        }
    }
}

/// A remote store that accepts whole files.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Human-readable destination name for logs.
    fn name(&self) -> String;

    /// Create or update `remote_path` with `content`.
    async fn upload(&self, content: &str, remote_path: &str) -> Result<UploadOutcome>;

    /// Current content of `remote_path`, if the store supports reading it.
    async fn fetch(&self, _remote_path: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// One file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub remote_path: String,
    pub content: String,
}

/// Result of sending one file to one destination.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub destination: String,
    pub remote_path: String,
    pub result: std::result::Result<UploadOutcome, String>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build the destinations enabled in `config`.
pub fn build_uploaders(config: &UploadsConfig) -> Result<Vec<Box<dyn Uploader>>> {
    let timeout = Duration::from_secs(UPLOAD_TIMEOUT_SECS);
    let mut uploaders: Vec<Box<dyn Uploader>> = Vec::new();

    if let Some(github) = &config.github {
        uploaders.push(Box::new(GitContentsUploader::github(github, timeout)?));
    }
    if let Some(s3) = &config.s3 {
        uploaders.push(Box::new(S3Uploader::new(s3, timeout)?));
    }
    if let Some(gitea) = &config.gitea {
        uploaders.push(Box::new(GitContentsUploader::gitea(gitea, timeout)?));
    }

    Ok(uploaders)
}

/// Send every file to every destination, in order.
pub async fn upload_all(
    uploaders: &[Box<dyn Uploader>],
    files: &[UploadFile],
    log: &RunLog,
) -> Vec<UploadReport> {
    let mut reports = Vec::with_capacity(uploaders.len() * files.len());

    for uploader in uploaders {
        let destination = uploader.name();
        let mut success_count = 0;

        for file in files {
            let result = match uploader.upload(&file.content, &file.remote_path).await {
                Ok(outcome) => {
                    success_count += 1;
                    log.push(format!("{} {} on {}", file.remote_path, outcome, destination));
                    Ok(outcome)
                }
                Err(e) => {
                    let err = WlmergeError::Upload {
                        destination: destination.clone(),
                        message: format!("{}: {:#}", file.remote_path, e),
                    };
                    log.warn(err.to_string());
                    Err(err.to_string())
                }
            };
            reports.push(UploadReport {
                destination: destination.clone(),
                remote_path: file.remote_path.clone(),
                result,
            });
        }

        tracing::debug!(
            "Uploaded {}/{} files to {}",
            success_count,
            files.len(),
            destination
        );
    }

    reports
}

/// Percent-encode each segment of a `/`-separated path.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
