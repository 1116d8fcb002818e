//! Identity of a pass-type certificate.
//!
//! Pass certificates carry their identifier in the subject common name
//! (`Pass Type ID: pass.com.example.card`) and the team identifier in the
//! organizational unit. This is what certificate onboarding uses to key a
//! new [`crate::certificate::CertificateRecord`].

use super::pkcs12::extract_pkcs12;
use crate::{Error, Result};
use x509_certificate::{CapturedX509Certificate, X509Certificate};

const PASS_TYPE_CN_PREFIX: &str = "Pass Type ID:";

/// Identifier, team and organization declared by a certificate subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentity {
    /// Pass-type identifier from the subject CN.
    pub pass_type_identifier: String,

    /// Team identifier from the subject OU, or O when there is no OU.
    pub team_identifier: String,

    /// Organization name from the subject O, if present.
    pub organization_name: Option<String>,
}

impl CertificateIdentity {
    /// Read the identity from a parsed certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CertificateExtraction`] if the CN does not follow the
    /// `Pass Type ID: pass.xxx` pattern or no team identifier is present.
    pub fn from_certificate(cert: &X509Certificate) -> Result<Self> {
        let subject = cert.subject_name();

        let pass_type_identifier = subject
            .iter_common_name()
            .filter_map(|atav| atav.to_string().ok())
            .find_map(|cn| parse_pass_type_cn(&cn))
            .ok_or_else(|| {
                Error::CertificateExtraction(
                    "Certificate subject has no \"Pass Type ID: pass.*\" common name".into(),
                )
            })?;

        let organization_name = subject
            .iter_organization()
            .find_map(|atav| atav.to_string().ok())
            .filter(|o| !o.trim().is_empty());

        let team_identifier = subject
            .iter_organizational_unit()
            .find_map(|atav| atav.to_string().ok())
            .filter(|ou| !ou.trim().is_empty())
            .or_else(|| organization_name.clone())
            .ok_or_else(|| {
                Error::CertificateExtraction("Certificate subject has no team identifier".into())
            })?;

        Ok(Self {
            pass_type_identifier,
            team_identifier,
            organization_name,
        })
    }

    /// Read the identity from a PEM or DER certificate.
    pub fn from_certificate_bytes(data: &[u8]) -> Result<Self> {
        let cert = CapturedX509Certificate::from_pem(data)
            .or_else(|_| CapturedX509Certificate::from_der(data.to_vec()))
            .map_err(|e| {
                Error::CertificateExtraction(format!("Failed to load certificate: {}", e))
            })?;
        Self::from_certificate(&cert)
    }

    /// Open a PKCS#12 container and read the identity of its leaf certificate.
    pub fn from_pkcs12(p12_data: &[u8], password: &str) -> Result<Self> {
        let credentials = extract_pkcs12(p12_data, password)?;
        Self::from_certificate_bytes(credentials.certificate_pem.as_bytes())
    }
}

fn parse_pass_type_cn(cn: &str) -> Option<String> {
    let identifier = cn.strip_prefix(PASS_TYPE_CN_PREFIX)?.trim();
    if identifier.starts_with("pass.") && identifier.len() > "pass.".len() {
        Some(identifier.to_string())
    } else {
        None
    }
}
