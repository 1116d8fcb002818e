use super::repository::{CertificateRecord, CertificateRepository};
use super::source::{BlobClient, SourceLoader};
use super::SigningCertificate;
use crate::config::EngineConfig;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Resolves a pass-type identifier to its signing material.
#[derive(Clone)]
pub struct CertificateResolver {
    repository: Arc<dyn CertificateRepository>,
    loader: SourceLoader,
    global_pass_type_identifier: Option<String>,
}

impl CertificateResolver {
    pub fn new(
        repository: Arc<dyn CertificateRepository>,
        loader: SourceLoader,
        global_pass_type_identifier: Option<String>,
    ) -> Self {
        Self {
            repository,
            loader,
            global_pass_type_identifier,
        }
    }

    /// Build a resolver using the blob store and global identifier from `config`.
    pub fn from_config(
        repository: Arc<dyn CertificateRepository>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let loader = SourceLoader::new(BlobClient::new(&config.blob_store)?);
        Ok(Self::new(
            repository,
            loader,
            config.global_pass_type_identifier.clone(),
        ))
    }

    /// Resolve `pass_type_identifier` (scoped to `tenant_id`) to signing material.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCertificate`] when no record matches
    /// - [`Error::CertificateFetch`] / [`Error::Io`] when the bytes cannot be loaded
    pub async fn resolve(
        &self,
        pass_type_identifier: &str,
        tenant_id: Option<&str>,
    ) -> Result<SigningCertificate> {
        let record = self.lookup(pass_type_identifier, tenant_id).await?;

        let (p12, wwdr) = tokio::try_join!(
            self.loader.load(&record.p12),
            self.loader.load(&record.wwdr)
        )?;

        debug!(
            pass_type_identifier,
            tenant_id,
            source = record.p12.kind(),
            "resolved signing certificate"
        );

        Ok(SigningCertificate {
            pass_type_identifier: record.pass_type_identifier,
            team_identifier: record.team_identifier,
            organization_name_default: record.organization_name,
            p12,
            p12_password: record.password,
            wwdr,
            source_kind: record.p12.kind(),
        })
    }

    async fn lookup(
        &self,
        pass_type_identifier: &str,
        tenant_id: Option<&str>,
    ) -> Result<CertificateRecord> {
        let is_global = self.global_pass_type_identifier.as_deref() == Some(pass_type_identifier);

        let record = if is_global {
            self.repository.find_default().await?
        } else {
            self.repository.find(pass_type_identifier, tenant_id).await?
        };

        // The default slot could hold a different identifier than the configured one.
        match record {
            Some(record) if record.pass_type_identifier == pass_type_identifier => Ok(record),
            _ => Err(Error::MissingCertificate {
                pass_type_identifier: pass_type_identifier.to_string(),
                tenant_id: tenant_id.map(str::to_string),
            }),
        }
    }
}
