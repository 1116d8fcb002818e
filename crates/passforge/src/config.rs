//! Engine configuration.
//!
//! [`EngineConfig`] is usually loaded from a TOML file with
//! [`EngineConfig::load`], but every field has a default so library
//! consumers can build one in code.
//!
//! ```toml
//! global_pass_type_identifier = "pass.com.example.shared"
//! compression_level = 6
//!
//! [blob_store]
//! base_url = "https://blobs.example.com/certificates/"
//! timeout_secs = 20
//! max_retries = 2
//! ```

use crate::pkpass::CompressionLevel;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for a [`crate::PassGenerator`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pass-type identifier served by the tenant-independent default certificate.
    pub global_pass_type_identifier: Option<String>,

    /// Parent directory for per-request working directories.
    ///
    /// Uses the system temp directory when unset.
    pub work_dir: Option<PathBuf>,

    /// ZIP compression level for produced packages (0-9).
    pub compression_level: u32,

    /// `organizationName` written when neither the pass nor the certificate has one.
    pub fallback_organization_name: String,

    /// `description` written when the pass has none.
    pub fallback_description: String,

    /// Remote certificate blob store settings.
    pub blob_store: BlobStoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_pass_type_identifier: None,
            work_dir: None,
            compression_level: CompressionLevel::DEFAULT.level(),
            fallback_organization_name: "Pass Issuer".to_string(),
            fallback_description: "Wallet pass".to_string(),
            blob_store: BlobStoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing, unreadable, or not
    /// valid TOML for this schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(Error::Config(format!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.fallback_organization_name.trim().is_empty()
            || self.fallback_description.trim().is_empty()
        {
            return Err(Error::Config(
                "fallback_organization_name and fallback_description must not be empty".into(),
            ));
        }
        if let Some(ref global) = self.global_pass_type_identifier {
            if global.trim().is_empty() {
                return Err(Error::Config(
                    "global_pass_type_identifier must not be empty when set".into(),
                ));
            }
        }
        self.blob_store.validate()
    }

    /// Compression level as the archive type.
    pub fn compression(&self) -> CompressionLevel {
        CompressionLevel::new(self.compression_level)
    }
}

/// Settings for fetching certificate bytes over HTTPS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Base URL relative blob locations are joined onto.
    pub base_url: Option<String>,

    /// Bearer token sent with every request.
    pub bearer_token: Option<SecretString>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each further retry.
    pub initial_backoff_ms: u64,

    /// Allow plain `http://` URLs even when a bearer token is configured.
    ///
    /// Only meant for local test servers.
    pub allow_insecure_http: bool,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 200,
            allow_insecure_http: false,
        }
    }
}

/// Upper bound for `timeout_secs`.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound for `max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Upper bound for `initial_backoff_ms`.
pub const MAX_INITIAL_BACKOFF_MS: u64 = 60_000;

impl BlobStoreConfig {
    /// Check that timeout, retry count and backoff are within bounds.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "blob_store.timeout_secs must be 1-{}, got {}",
                MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(Error::Config(format!(
                "blob_store.max_retries must be at most {}, got {}",
                MAX_RETRIES, self.max_retries
            )));
        }
        if self.initial_backoff_ms > MAX_INITIAL_BACKOFF_MS {
            return Err(Error::Config(format!(
                "blob_store.initial_backoff_ms must be at most {}, got {}",
                MAX_INITIAL_BACKOFF_MS, self.initial_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.global_pass_type_identifier.is_none());
        assert_eq!(config.compression_level, 6);
        assert_eq!(config.blob_store.timeout(), Duration::from_secs(30));
        assert_eq!(config.blob_store.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = EngineConfig::from_toml(
            r#"
            global_pass_type_identifier = "pass.com.example.shared"
            compression_level = 9

            [blob_store]
            base_url = "https://blobs.example.com/"
            bearer_token = "s3cret"
            max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(
            config.global_pass_type_identifier.as_deref(),
            Some("pass.com.example.shared")
        );
        assert_eq!(config.compression().level(), 9);
        assert_eq!(config.blob_store.max_retries, 1);
        assert_eq!(config.blob_store.timeout_secs, 30);
        assert_eq!(
            config.blob_store.bearer_token.as_ref().unwrap().expose_secret(),
            "s3cret"
        );
        assert_eq!(config.fallback_description, "Wallet pass");
    }

    #[test]
    fn test_rejects_out_of_range_compression() {
        let result = EngineConfig::from_toml("compression_level = 12");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_global_identifier() {
        let result = EngineConfig::from_toml("global_pass_type_identifier = \"  \"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_blob_store_settings() {
        for text in [
            "[blob_store]\ntimeout_secs = 0",
            "[blob_store]\ntimeout_secs = 100000",
            "[blob_store]\nmax_retries = 64",
            "[blob_store]\ninitial_backoff_ms = 3600000",
        ] {
            let result = EngineConfig::from_toml(text);
            assert!(matches!(result, Err(Error::Config(_))), "{text}");
        }

        let config = EngineConfig::from_toml(
            "[blob_store]\ntimeout_secs = 600\nmax_retries = 10\ninitial_backoff_ms = 60000",
        )
        .unwrap();
        assert_eq!(config.blob_store.max_retries, MAX_RETRIES);
        assert!(!config.blob_store.allow_insecure_http);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = EngineConfig::load(temp_dir.path().join("absent.toml"));
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("not found")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("passforge.toml");
        std::fs::write(&path, "fallback_organization_name = \"Acme\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.fallback_organization_name, "Acme");
    }
}
