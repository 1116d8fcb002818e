//! Signing certificate resolution.
//!
//! Given a pass-type identifier and an optional tenant, the
//! [`CertificateResolver`] looks the certificate up in a
//! [`CertificateRepository`], loads its bytes from whichever
//! [`CertificateSource`] holds them, and returns a [`SigningCertificate`].
//!
//! # Selection
//!
//! | Requested identifier | Lookup |
//! |----------------------|--------|
//! | equals the configured global identifier | the repository's default certificate |
//! | anything else | `(identifier, tenant)` |
//!
//! A missing certificate is always [`crate::Error::MissingCertificate`];
//! there is no fallback to another identifier.

pub mod repository;
pub mod resolver;
pub mod source;

pub use repository::{
    CertificateRecord, CertificateRepository, InMemoryCertificateRepository,
    JsonFileCertificateRepository,
};
pub use resolver::CertificateResolver;
pub use source::{BlobClient, CertificateSource, SourceLoader};

use secrecy::SecretString;
use std::fmt;

/// Signing material resolved for one generation.
///
/// Never persisted by this crate and never logged; the `Debug`
/// implementation omits the PKCS#12 bytes and the password.
#[derive(Clone)]
pub struct SigningCertificate {
    /// Pass-type identifier bound to the certificate.
    pub pass_type_identifier: String,

    /// Apple team identifier.
    pub team_identifier: String,

    /// Organization name to use when the pass has none.
    pub organization_name_default: Option<String>,

    /// PKCS#12 container bytes.
    pub p12: Vec<u8>,

    /// PKCS#12 password.
    pub p12_password: SecretString,

    /// WWDR intermediate certificate, PEM or DER.
    pub wwdr: Vec<u8>,

    /// Which kind of source the PKCS#12 was loaded from.
    pub source_kind: &'static str,
}

impl fmt::Debug for SigningCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCertificate")
            .field("pass_type_identifier", &self.pass_type_identifier)
            .field("team_identifier", &self.team_identifier)
            .field("organization_name_default", &self.organization_name_default)
            .field("p12_len", &self.p12.len())
            .field("wwdr_len", &self.wwdr.len())
            .field("source_kind", &self.source_kind)
            .finish_non_exhaustive()
    }
}
