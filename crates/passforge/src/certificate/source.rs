//! Where certificate bytes live, and how to fetch them.
//!
//! A [`CertificateSource`] is either a blob in the remote object store or a
//! legacy local file. The resolver turns either into bytes, so nothing
//! downstream knows which one it was.

use crate::config::BlobStoreConfig;
use crate::{Error, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Location of a certificate file (PKCS#12 or WWDR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CertificateSource {
    /// Object in the remote blob store.
    ///
    /// `location` is either an absolute `https://` URL or a key joined onto
    /// [`BlobStoreConfig::base_url`].
    Blob { location: String },

    /// File on the local filesystem.
    LocalFile { path: PathBuf },
}

impl CertificateSource {
    pub fn blob(location: impl Into<String>) -> Self {
        CertificateSource::Blob {
            location: location.into(),
        }
    }

    pub fn local_file(path: impl Into<PathBuf>) -> Self {
        CertificateSource::LocalFile { path: path.into() }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CertificateSource::Blob { .. } => "blob",
            CertificateSource::LocalFile { .. } => "local-file",
        }
    }
}

/// Reads certificate bytes from any [`CertificateSource`].
#[derive(Debug, Clone)]
pub struct SourceLoader {
    blob: BlobClient,
}

impl SourceLoader {
    pub fn new(blob: BlobClient) -> Self {
        Self { blob }
    }

    /// Fetch the bytes behind `source`.
    pub async fn load(&self, source: &CertificateSource) -> Result<Vec<u8>> {
        match source {
            CertificateSource::Blob { location } => self.blob.fetch(location).await,
            CertificateSource::LocalFile { path } => {
                debug!(path = %path.display(), "reading certificate from local file");
                tokio::fs::read(path).await.map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to read certificate file {}: {}", path.display(), e),
                    ))
                })
            }
        }
    }
}

/// HTTPS client for the certificate blob store.
///
/// Sends the configured bearer token, applies a per-request timeout and
/// retries transient failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct BlobClient {
    http: reqwest::Client,
    base_url: Option<String>,
    bearer_token: Option<SecretString>,
    max_retries: u32,
    initial_backoff: Duration,
    allow_insecure_http: bool,
}

impl BlobClient {
    /// Build a client from blob store settings.
    pub fn new(config: &BlobStoreConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            bearer_token: config.bearer_token.clone(),
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff(),
            allow_insecure_http: config.allow_insecure_http,
        })
    }

    fn url_for(&self, location: &str) -> Result<String> {
        let url = if location.starts_with("https://") || location.starts_with("http://") {
            location.to_string()
        } else {
            let base = self.base_url.as_deref().ok_or_else(|| {
                Error::Config(format!(
                    "Blob location {:?} is relative but no blob_store.base_url is configured",
                    location
                ))
            })?;
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                location.trim_start_matches('/')
            )
        };

        // The bearer token must not travel in cleartext.
        if !url.starts_with("https://")
            && self.bearer_token.is_some()
            && !self.allow_insecure_http
        {
            return Err(Error::Config(format!(
                "Refusing to send the blob store token to non-HTTPS location {:?}",
                location
            )));
        }
        Ok(url)
    }

    /// Download a blob, retrying transient failures.
    pub async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let url = self.url_for(location)?;
        let mut attempt = 0;

        loop {
            match self.fetch_once(&url, location).await {
                Ok(bytes) => {
                    debug!(location, bytes = bytes.len(), "fetched certificate blob");
                    return Ok(bytes);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        location,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "certificate blob fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str, location: &str) -> Result<Vec<u8>> {
        let mut request = self.http.get(url);
        if let Some(ref token) = self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        let response = request.send().await.map_err(|e| Error::CertificateFetch {
            location: location.to_string(),
            message: e.to_string(),
            retryable: e.is_timeout() || e.is_connect(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CertificateFetch {
                location: location.to_string(),
                message: format!("HTTP {}", status),
                retryable: is_retryable_status(status),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::CertificateFetch {
            location: location.to_string(),
            message: format!("failed to read response body: {}", e),
            retryable: true,
        })?;

        if body.is_empty() {
            return Err(Error::CertificateFetch {
                location: location.to_string(),
                message: "empty response body".into(),
                retryable: false,
            });
        }

        Ok(body.to_vec())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
