//! End-to-end pass generation.
//!
//! [`PassGenerator`] wires the pieces together for one request:
//!
//! 1. Load the template snapshot from a [`TemplateRepository`]
//! 2. Resolve the signing certificate for the template's identifier
//! 3. Assemble `pass.json` and images into a fresh payload directory
//! 4. Hash the payload into `manifest.json`
//! 5. Extract the PKCS#12 into a separate certificate directory and sign
//!    the manifest
//! 6. Check the payload for certificate or key files
//! 7. Zip the payload
//!
//! Steps 3 to 7 are CPU-bound and run on the blocking thread pool. Both
//! working directories are unique per request and removed on return,
//! whether generation succeeded or not.
//!
//! # Examples
//!
//! ```no_run
//! use passforge::certificate::{CertificateResolver, InMemoryCertificateRepository};
//! use passforge::template::InMemoryTemplateRepository;
//! use passforge::{EngineConfig, PassGenerator, PassRequest};
//! use std::sync::Arc;
//!
//! # async fn run() -> passforge::Result<()> {
//! let config = EngineConfig::default();
//! let templates = Arc::new(InMemoryTemplateRepository::new());
//! let certificates = Arc::new(InMemoryCertificateRepository::new());
//! let resolver = CertificateResolver::from_config(certificates, &config)?;
//!
//! let generator = PassGenerator::new(templates, resolver, config);
//! let pass = generator
//!     .generate(PassRequest::new("loyalty-card").field("FIRST_NAME", "Jane"))
//!     .await?;
//! std::fs::write(format!("{}.pkpass", pass.serial_number), &pass.bytes)?;
//! # Ok(())
//! # }
//! ```

use crate::bundle::{ManifestBuilder, SIGNATURE_FILE};
use crate::certificate::{CertificateRepository, CertificateResolver, SigningCertificate};
use crate::config::EngineConfig;
use crate::crypto::{extract_pkcs12_secret, sign_manifest, SignerMaterial};
use crate::pass::PassAssembler;
use crate::pkpass::{create_pkpass, CompressionLevel};
use crate::security::assert_payload_clean;
use crate::template::{TemplateRepository, TemplateSnapshot};
use crate::{Error, Result};
use secrecy::ExposeSecret;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// One pass generation request.
#[derive(Debug, Clone, Default)]
pub struct PassRequest {
    /// Template to generate from.
    pub template_id: String,

    /// Values overriding the template's placeholder defaults.
    pub field_values: BTreeMap<String, String>,

    /// Tenant the certificate lookup is scoped to.
    pub tenant_id: Option<String>,
}

impl PassRequest {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            ..Default::default()
        }
    }

    /// Set one field value.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.field_values.insert(key.into(), value.into());
        self
    }

    /// Set all field values.
    pub fn field_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.field_values = values;
        self
    }

    /// Scope the certificate lookup to a tenant.
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// A signed package and its metadata.
#[derive(Clone)]
pub struct GeneratedPass {
    /// The `.pkpass` ZIP.
    pub bytes: Vec<u8>,

    /// Serial number assigned to the pass.
    pub serial_number: String,

    /// Identifier of the certificate that signed it.
    pub pass_type_identifier: String,

    /// Placeholder values actually substituted.
    pub field_values: BTreeMap<String, String>,
}

impl fmt::Debug for GeneratedPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedPass")
            .field("size", &self.bytes.len())
            .field("serial_number", &self.serial_number)
            .field("pass_type_identifier", &self.pass_type_identifier)
            .field("field_values", &self.field_values)
            .finish()
    }
}

/// Generates signed passes from stored templates.
#[derive(Clone)]
pub struct PassGenerator {
    templates: Arc<dyn TemplateRepository>,
    resolver: CertificateResolver,
    assembler: PassAssembler,
    work_dir: Option<PathBuf>,
    compression: CompressionLevel,
}

impl PassGenerator {
    /// Create a generator.
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        resolver: CertificateResolver,
        config: EngineConfig,
    ) -> Self {
        Self {
            templates,
            resolver,
            assembler: PassAssembler::from_config(&config),
            work_dir: config.work_dir.clone(),
            compression: config.compression(),
        }
    }

    /// Create a generator, building the certificate resolver from `config`.
    pub fn from_config(
        templates: Arc<dyn TemplateRepository>,
        certificates: Arc<dyn CertificateRepository>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let resolver = CertificateResolver::from_config(certificates, &config)?;
        Ok(Self::new(templates, resolver, config))
    }

    /// Override the ZIP compression level.
    pub fn compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }

    /// Override the parent directory of the per-request working directories.
    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(path.into());
        self
    }

    /// Generate a pass from a stored template.
    ///
    /// # Errors
    ///
    /// Any error aborts the generation; no bytes are returned. See
    /// [`enum@Error`] for the taxonomy.
    pub async fn generate(&self, request: PassRequest) -> Result<GeneratedPass> {
        let snapshot = self
            .templates
            .load(&request.template_id)
            .await?
            .ok_or_else(|| {
                Error::TemplateInvalid(format!("Template {} not found", request.template_id))
            })?;

        self.generate_from_snapshot(snapshot, request.field_values, request.tenant_id.as_deref())
            .await
    }

    /// Generate a pass from an already loaded template snapshot.
    pub async fn generate_from_snapshot(
        &self,
        snapshot: TemplateSnapshot,
        field_values: BTreeMap<String, String>,
        tenant_id: Option<&str>,
    ) -> Result<GeneratedPass> {
        let pass_type_identifier = snapshot
            .declared_pass_type_identifier()
            .ok_or_else(|| {
                Error::TemplateInvalid(format!(
                    "Template {} declares no passTypeIdentifier",
                    snapshot.id
                ))
            })?
            .to_string();

        let certificate = self.resolver.resolve(&pass_type_identifier, tenant_id).await?;

        let assembler = self.assembler.clone();
        let work_dir = self.work_dir.clone();
        let compression = self.compression;
        let template_id = snapshot.id.clone();

        let generated = tokio::task::spawn_blocking(move || {
            build_package(
                &assembler,
                &snapshot,
                &field_values,
                &certificate,
                work_dir.as_deref(),
                compression,
            )
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("Generation task failed: {}", e))))??;

        info!(
            template = %template_id,
            tenant = tenant_id,
            serial_number = %generated.serial_number,
            pass_type_identifier = %generated.pass_type_identifier,
            size = generated.bytes.len(),
            "generated pass"
        );

        Ok(generated)
    }
}

/// Run the synchronous part of a generation with an already resolved
/// certificate.
///
/// Creates the payload and certificate directories under `work_dir` (or the
/// system temp directory) and removes both before returning.
pub fn build_package(
    assembler: &PassAssembler,
    snapshot: &TemplateSnapshot,
    field_values: &BTreeMap<String, String>,
    certificate: &SigningCertificate,
    work_dir: Option<&Path>,
    compression: CompressionLevel,
) -> Result<GeneratedPass> {
    let payload_dir = request_dir(work_dir, "passforge-payload-")?;
    let cert_dir = request_dir(work_dir, "passforge-cert-")?;

    let assembled = assembler.assemble(snapshot, field_values, certificate)?;
    assembled.write_to(payload_dir.path())?;

    let mut manifest = ManifestBuilder::new(payload_dir.path());
    let manifest_bytes = manifest.scan()?.write()?;
    debug!(files = manifest.file_count(), "wrote manifest");

    let material = stage_signer_material(cert_dir.path(), certificate)?;
    let signature = sign_manifest(&manifest_bytes, &material)?;
    fs::write(payload_dir.path().join(SIGNATURE_FILE), &signature)?;
    debug!(size = signature.len(), "signed manifest");

    assert_payload_clean(payload_dir.path())?;
    let bytes = create_pkpass(payload_dir.path(), compression)?;

    Ok(GeneratedPass {
        bytes,
        serial_number: assembled.serial_number.clone(),
        pass_type_identifier: certificate.pass_type_identifier.clone(),
        field_values: assembled.field_values,
    })
}

fn request_dir(parent: Option<&Path>, prefix: &str) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let dir = match parent {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Extract the PKCS#12 into `cert_dir` and load the signer from there.
fn stage_signer_material(cert_dir: &Path, certificate: &SigningCertificate) -> Result<SignerMaterial> {
    let p12_path = cert_dir.join("signer.p12");
    write_private(&p12_path, &certificate.p12)?;

    let credentials = extract_pkcs12_secret(&fs::read(&p12_path)?, &certificate.p12_password)?;

    let cert_path = cert_dir.join("signer-cert.pem");
    let key_path = cert_dir.join("signer-key.pem");
    let wwdr_path = cert_dir.join("wwdr.cer");
    write_private(&cert_path, credentials.certificate_pem.as_bytes())?;
    write_private(&key_path, credentials.private_key_pem.expose_secret().as_bytes())?;
    write_private(&wwdr_path, &certificate.wwdr)?;

    SignerMaterial::from_pem_files(&cert_path, &key_path, &wwdr_path)
}

fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    Ok(())
}
