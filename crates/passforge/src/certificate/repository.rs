//! Certificate records and the repository holding them.
//!
//! Each repository instance owns its own records; there is no process-wide
//! certificate list. [`InMemoryCertificateRepository`] suits tests and
//! embedding, [`JsonFileCertificateRepository`] persists to a JSON file.

use super::source::CertificateSource;
use crate::crypto::CertificateIdentity;
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// A signing certificate as registered by the certificate store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Pass-type identifier bound to the certificate.
    pub pass_type_identifier: String,

    /// Apple team identifier of the certificate owner.
    pub team_identifier: String,

    /// Tenant owning the certificate; `None` for tenant-independent certificates.
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Organization name used when a pass has none.
    #[serde(default)]
    pub organization_name: Option<String>,

    /// Password of the PKCS#12 container.
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,

    /// Where the PKCS#12 container lives.
    pub p12: CertificateSource,

    /// Where the WWDR intermediate certificate lives.
    pub wwdr: CertificateSource,
}

impl CertificateRecord {
    /// Build a record from an inspected certificate identity.
    pub fn from_identity(
        identity: CertificateIdentity,
        tenant_id: Option<String>,
        password: SecretString,
        p12: CertificateSource,
        wwdr: CertificateSource,
    ) -> Self {
        Self {
            pass_type_identifier: identity.pass_type_identifier,
            team_identifier: identity.team_identifier,
            tenant_id,
            organization_name: identity.organization_name,
            password,
            p12,
            wwdr,
        }
    }

    fn matches(&self, pass_type_identifier: &str, tenant_id: Option<&str>) -> bool {
        self.pass_type_identifier == pass_type_identifier && self.tenant_id.as_deref() == tenant_id
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Storage of signing certificates.
///
/// Lookups never substitute one identifier for another: a record is only
/// returned when its `pass_type_identifier` equals the requested one.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Find the record for `(pass_type_identifier, tenant_id)`.
    ///
    /// With a tenant, a tenant-scoped record is preferred and a
    /// tenant-independent record for the same identifier is accepted.
    /// Without a tenant, only tenant-independent records match.
    async fn find(
        &self,
        pass_type_identifier: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<CertificateRecord>>;

    /// The tenant-independent default certificate, if one was set.
    async fn find_default(&self) -> Result<Option<CertificateRecord>>;

    /// Add a record, replacing any record with the same identifier and tenant.
    async fn add(&self, record: CertificateRecord) -> Result<()>;

    /// Remove the record for `(pass_type_identifier, tenant_id)`.
    ///
    /// Returns whether a record was removed.
    async fn remove(&self, pass_type_identifier: &str, tenant_id: Option<&str>) -> Result<bool>;

    /// Mark the tenant-independent record for `pass_type_identifier` as the default.
    async fn set_default(&self, pass_type_identifier: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Records {
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    certificates: Vec<CertificateRecord>,
}

impl Records {
    fn find(&self, pass_type_identifier: &str, tenant_id: Option<&str>) -> Option<&CertificateRecord> {
        let scoped = self
            .certificates
            .iter()
            .find(|r| r.matches(pass_type_identifier, tenant_id));

        match (scoped, tenant_id) {
            (Some(record), _) => Some(record),
            (None, Some(_)) => self
                .certificates
                .iter()
                .find(|r| r.matches(pass_type_identifier, None)),
            (None, None) => None,
        }
    }

    fn find_default(&self) -> Option<&CertificateRecord> {
        let default = self.default.as_deref()?;
        self.certificates.iter().find(|r| r.matches(default, None))
    }

    fn add(&mut self, record: CertificateRecord) -> Result<()> {
        if record.pass_type_identifier.trim().is_empty() {
            return Err(Error::Repository("pass_type_identifier must not be empty".into()));
        }
        if record.team_identifier.trim().is_empty() {
            return Err(Error::Repository("team_identifier must not be empty".into()));
        }
        self.certificates
            .retain(|r| !r.matches(&record.pass_type_identifier, record.tenant_id.as_deref()));
        self.certificates.push(record);
        Ok(())
    }

    fn remove(&mut self, pass_type_identifier: &str, tenant_id: Option<&str>) -> bool {
        let before = self.certificates.len();
        self.certificates
            .retain(|r| !r.matches(pass_type_identifier, tenant_id));
        let removed = self.certificates.len() != before;

        if removed && tenant_id.is_none() && self.default.as_deref() == Some(pass_type_identifier) {
            self.default = None;
        }
        removed
    }

    fn set_default(&mut self, pass_type_identifier: &str) -> Result<()> {
        if !self
            .certificates
            .iter()
            .any(|r| r.matches(pass_type_identifier, None))
        {
            return Err(Error::Repository(format!(
                "No tenant-independent certificate for {} to use as default",
                pass_type_identifier
            )));
        }
        self.default = Some(pass_type_identifier.to_string());
        Ok(())
    }
}

/// Certificate repository held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCertificateRepository {
    records: RwLock<Records>,
}

impl InMemoryCertificateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateRepository for InMemoryCertificateRepository {
    async fn find(
        &self,
        pass_type_identifier: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<CertificateRecord>> {
        Ok(self
            .records
            .read()
            .await
            .find(pass_type_identifier, tenant_id)
            .cloned())
    }

    async fn find_default(&self) -> Result<Option<CertificateRecord>> {
        Ok(self.records.read().await.find_default().cloned())
    }

    async fn add(&self, record: CertificateRecord) -> Result<()> {
        self.records.write().await.add(record)
    }

    async fn remove(&self, pass_type_identifier: &str, tenant_id: Option<&str>) -> Result<bool> {
        Ok(self
            .records
            .write()
            .await
            .remove(pass_type_identifier, tenant_id))
    }

    async fn set_default(&self, pass_type_identifier: &str) -> Result<()> {
        self.records.write().await.set_default(pass_type_identifier)
    }
}

/// Certificate repository persisted as a single JSON file.
///
/// The file is read on open and rewritten atomically (write to a sibling
/// temp file, then rename) after every mutation. The PKCS#12 password is
/// stored as given; protecting the file is the operator's job.
#[derive(Debug)]
pub struct JsonFileCertificateRepository {
    path: PathBuf,
    records: RwLock<Records>,
}

impl JsonFileCertificateRepository {
    /// Open the repository at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                Error::Repository(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Records::default(),
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &Records) -> Result<()> {
        let data = serde_json::to_vec_pretty(records)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            std::io::Write::write_all(&mut tmp, &data)?;
            tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Repository(format!("Persist task failed: {}", e)))??;

        debug!(path = %self.path.display(), "certificate repository saved");
        Ok(())
    }
}

#[async_trait]
impl CertificateRepository for JsonFileCertificateRepository {
    async fn find(
        &self,
        pass_type_identifier: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<CertificateRecord>> {
        Ok(self
            .records
            .read()
            .await
            .find(pass_type_identifier, tenant_id)
            .cloned())
    }

    async fn find_default(&self) -> Result<Option<CertificateRecord>> {
        Ok(self.records.read().await.find_default().cloned())
    }

    async fn add(&self, record: CertificateRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let mut updated = records.clone();
        updated.add(record)?;
        self.persist(&updated).await?;
        *records = updated;
        Ok(())
    }

    async fn remove(&self, pass_type_identifier: &str, tenant_id: Option<&str>) -> Result<bool> {
        let mut records = self.records.write().await;
        let mut updated = records.clone();
        if !updated.remove(pass_type_identifier, tenant_id) {
            return Ok(false);
        }
        self.persist(&updated).await?;
        *records = updated;
        Ok(true)
    }

    async fn set_default(&self, pass_type_identifier: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let mut updated = records.clone();
        updated.set_default(pass_type_identifier)?;
        self.persist(&updated).await?;
        *records = updated;
        Ok(())
    }
}
