//! S3-compatible object store, path-style, signed with AWS Signature V4.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

use super::{encode_path, UploadOutcome, Uploader};
use crate::config::{S3Config, SecureString};
use crate::utils::truncate;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Inputs to [`sign_v4`] for a request without a query string.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// `host` or `host:port`, as sent in the Host header.
    pub host: &'a str,
    /// Already percent-encoded absolute path.
    pub path: &'a str,
    /// Hex SHA-256 of the body.
    pub payload_hash: &'a str,
    /// `YYYYMMDDTHHMMSSZ`
    pub amz_date: &'a str,
    pub region: &'a str,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `Authorization` header value for `request`.
pub fn sign_v4(request: &SigningRequest<'_>) -> Result<String> {
    let date = &request.amz_date[..8.min(request.amz_date.len())];
    let scope = format!("{}/{}/{}/aws4_request", date, request.region, SERVICE);

    let canonical_request = format!(
        "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
        request.method,
        request.path,
        request.host,
        request.payload_hash,
        request.amz_date,
        SIGNED_HEADERS,
        request.payload_hash
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        request.amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", request.secret_access_key).as_bytes(),
        date,
    )?;
    let k_region = hmac_sha256(&k_date, request.region)?;
    let k_service = hmac_sha256(&k_region, SERVICE)?;
    let k_signing = hmac_sha256(&k_service, "aws4_request")?;
    let signature = hex::encode(hmac_sha256(&k_signing, &string_to_sign)?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, request.access_key_id, scope, SIGNED_HEADERS, signature
    ))
}

pub struct S3Uploader {
    client: Client,
    endpoint: Url,
    bucket: String,
    region: String,
    prefix: String,
    access_key_id: SecureString,
    secret_access_key: SecureString,
}

impl S3Uploader {
    pub fn new(config: &S3Config, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid S3 endpoint: {}", config.endpoint))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for S3")?;
        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            prefix: config.prefix.trim_matches('/').to_string(),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
        })
    }

    /// Object key for a remote path.
    pub fn object_key(&self, remote_path: &str) -> String {
        if self.prefix.is_empty() {
            remote_path.to_string()
        } else {
            format!("{}/{}", self.prefix, remote_path)
        }
    }

    /// Canonical (encoded) request path: `/{bucket}/{key}` under the endpoint path.
    fn object_path(&self, remote_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.path().trim_end_matches('/'),
            encode_path(&self.bucket),
            encode_path(&self.object_key(remote_path))
        )
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    fn name(&self) -> String {
        format!("S3 ({})", self.bucket)
    }

    async fn upload(&self, content: &str, remote_path: &str) -> Result<UploadOutcome> {
        let path = self.object_path(remote_path);
        let host = self.host_header();
        let payload_hash = sha256_hex(content.as_bytes());
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        let authorization = sign_v4(&SigningRequest {
            method: "PUT",
            host: &host,
            path: &path,
            payload_hash: &payload_hash,
            amz_date: &amz_date,
            region: &self.region,
            access_key_id: self.access_key_id.as_str(),
            secret_access_key: self.secret_access_key.as_str(),
        })?;

        let mut url = self.endpoint.clone();
        url.set_path(&path);

        let response = self
            .client
            .put(url)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(content.to_string())
            .send()
            .await
            .with_context(|| format!("Failed to upload {} to S3", remote_path))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("S3 returned {}: {}", status, truncate(detail.trim(), 100));
        }
        // PUT replaces unconditionally
        Ok(UploadOutcome::Updated)
    }
}
