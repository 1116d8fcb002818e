//! Error types for pass generation.
//!
//! This module defines the [`enum@Error`] enum covering every failure case
//! of the packaging pipeline: template and field validation, certificate
//! resolution and extraction, signing, the security guard, and the ambient
//! I/O, archive and network errors underneath them.
//!
//! Every variant is fatal for the generation that raised it. Only transient
//! certificate fetch failures are worth retrying, see [`Error::is_retryable`].
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for passforge operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use passforge::Error;
///
/// fn report(result: passforge::Result<Vec<u8>>) {
///     match result {
///         Ok(bytes) => println!("Produced {} bytes", bytes.len()),
///         Err(Error::MissingCertificate { pass_type_identifier, .. }) => {
///             eprintln!("No certificate for {pass_type_identifier}")
///         }
///         Err(e) if e.is_retryable() => eprintln!("Transient failure, retry: {e}"),
///         Err(e) => eprintln!("No pass was produced: {e}"),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// The template snapshot is structurally unusable.
    ///
    /// Raised for a pass JSON that is not an object, unknown image asset
    /// names or densities, undecodable image data, or a `${KEY}` token left
    /// unresolved after substitution.
    #[error("Invalid template: {0}")]
    TemplateInvalid(String),

    /// No certificate is registered for the requested pass-type identifier.
    ///
    /// There is never a fallback certificate: a pass must not be signed with
    /// a certificate whose identifier differs from the one it declares.
    #[error("No signing certificate for pass type {pass_type_identifier}{}", tenant_suffix(.tenant_id))]
    MissingCertificate {
        /// Identifier that was requested.
        pass_type_identifier: String,
        /// Tenant the lookup was scoped to, if any.
        tenant_id: Option<String>,
    },

    /// The PKCS#12 container could not be opened.
    ///
    /// Covers a wrong password, corrupt ASN.1, or a container missing either
    /// the certificate or the private key.
    #[error("Certificate extraction failed: {0}")]
    CertificateExtraction(String),

    /// The pass document declares a different identifier than the certificate.
    #[error("Pass type identifier mismatch: certificate is {expected}, pass declares {found}")]
    PassTypeIdMismatch {
        /// Identifier bound to the signing certificate.
        expected: String,
        /// Identifier found in `pass.json`.
        found: String,
    },

    /// A mandatory top-level `pass.json` key is absent or empty.
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// A field entry has an empty `label` or `value`.
    #[error("Empty {attribute} in {style}.{group}[{index}]")]
    EmptyFieldValue {
        /// Style key the field lives under, e.g. `storeCard`.
        style: String,
        /// Field array name, e.g. `primaryFields`.
        group: String,
        /// Position within the field array.
        index: usize,
        /// Either `label` or `value`.
        attribute: &'static str,
    },

    /// Zero or several of the five pass style keys are present.
    #[error("Expected exactly one pass style object, found {}", describe_styles(.found))]
    InvalidStyleObjectCount {
        /// Style keys present in the document.
        found: Vec<String>,
    },

    /// A mandatory image asset is missing, e.g. `icon.png`.
    #[error("Missing required asset: {0}")]
    MissingRequiredAsset(String),

    /// The manifest could not be built or signed.
    #[error("Manifest signing failed: {0}")]
    ManifestSigning(String),

    /// The payload directory contains certificate or key material.
    #[error("Forbidden file in pass payload: {0}")]
    ForbiddenFile(String),

    /// Fetching certificate bytes from the blob store failed.
    ///
    /// `retryable` is set for timeouts, connection failures, rate limiting and
    /// server errors.
    #[error("Certificate fetch from {location} failed: {message}")]
    CertificateFetch {
        /// Blob location that was requested.
        location: String,
        /// Human-readable cause.
        message: String,
        /// Whether a later attempt may succeed.
        retryable: bool,
    },

    /// A template or certificate repository operation failed.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive operation failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Returns `true` when retrying the whole generation may succeed.
    ///
    /// Structural and validation errors never become valid on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CertificateFetch { retryable: true, .. })
    }
}

fn tenant_suffix(tenant_id: &Option<String>) -> String {
    match tenant_id {
        Some(tenant) => format!(" (tenant {tenant})"),
        None => String::new(),
    }
}

fn describe_styles(found: &[String]) -> String {
    if found.is_empty() {
        "none".to_string()
    } else {
        found.join(", ")
    }
}
