//! PKCS#12 extraction.
//!
//! Opens a password-protected PKCS#12 container and returns the leaf
//! certificate and its private key as PEM. The key is looked up in
//! shrouded (encrypted) key bags first, then in plain key bags.
//!
//! # Examples
//!
//! ```no_run
//! use passforge::crypto::extract_pkcs12;
//!
//! let p12_data = std::fs::read("pass-certificate.p12")?;
//! let credentials = extract_pkcs12(&p12_data, "password")?;
//! assert!(credentials.certificate_pem.starts_with("-----BEGIN CERTIFICATE-----"));
//! # Ok::<(), passforge::Error>(())
//! ```

use crate::{Error, Result};
use p12::{SafeBagKind, PFX};
use secrecy::{ExposeSecret, SecretString};
use x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair};

/// PKCS#12 plain `keyBag` OID: 1.2.840.113549.1.12.10.1.1
const KEY_BAG_OID: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];

/// Leaf certificate and private key pulled out of a PKCS#12 container.
///
/// # Security
///
/// The private key is held as a [`SecretString`] and zeroized on drop.
/// Never write these values into a pass payload.
pub struct ExtractedCredentials {
    /// Leaf certificate, PEM `CERTIFICATE`.
    pub certificate_pem: String,

    /// PKCS#8 private key, PEM `PRIVATE KEY`.
    pub private_key_pem: SecretString,
}

/// Extract the leaf certificate and private key from `p12_data`.
///
/// # Errors
///
/// Returns [`Error::CertificateExtraction`] if:
/// - The PKCS#12 data is malformed
/// - The password is incorrect
/// - No certificate is found in the container
/// - No private key is found in either shrouded or plain key bags
/// - The key is not a PKCS#8 key usable for signing
pub fn extract_pkcs12(p12_data: &[u8], password: &str) -> Result<ExtractedCredentials> {
    let pfx = PFX::parse(p12_data)
        .map_err(|e| Error::CertificateExtraction(format!("Failed to parse PKCS#12: {:?}", e)))?;

    if !pfx.verify_mac(password) {
        return Err(Error::CertificateExtraction(
            "Invalid password for PKCS#12".into(),
        ));
    }

    let certs = pfx.cert_x509_bags(password).map_err(|e| {
        Error::CertificateExtraction(format!("Failed to extract certs from PKCS#12: {:?}", e))
    })?;

    let cert_der = certs
        .into_iter()
        .next()
        .ok_or_else(|| Error::CertificateExtraction("No certificate in PKCS#12".into()))?;

    CapturedX509Certificate::from_der(cert_der.clone()).map_err(|e| {
        Error::CertificateExtraction(format!("Failed to parse certificate DER: {}", e))
    })?;

    let key_der = find_private_key(&pfx, password)?
        .ok_or_else(|| Error::CertificateExtraction("No private key in PKCS#12".into()))?;

    InMemorySigningKeyPair::from_pkcs8_der(&key_der).map_err(|e| {
        Error::CertificateExtraction(format!("Unsupported private key: {}", e))
    })?;

    Ok(ExtractedCredentials {
        certificate_pem: pem::encode(&pem::Pem::new("CERTIFICATE", cert_der)),
        private_key_pem: SecretString::new(pem::encode(&pem::Pem::new("PRIVATE KEY", key_der))),
    })
}

/// Same as [`extract_pkcs12`], taking the password as a secret.
pub fn extract_pkcs12_secret(p12_data: &[u8], password: &SecretString) -> Result<ExtractedCredentials> {
    extract_pkcs12(p12_data, password.expose_secret())
}

fn find_private_key(pfx: &PFX, password: &str) -> Result<Option<Vec<u8>>> {
    let shrouded = pfx.key_bags(password).map_err(|e| {
        Error::CertificateExtraction(format!("Failed to extract keys from PKCS#12: {:?}", e))
    })?;
    if let Some(key) = shrouded.into_iter().next() {
        return Ok(Some(key));
    }

    let bags = pfx.bags(password).map_err(|e| {
        Error::CertificateExtraction(format!("Failed to read PKCS#12 bags: {:?}", e))
    })?;

    Ok(bags.into_iter().find_map(|bag| match bag.bag {
        SafeBagKind::OtherBagKind(other)
            if other.bag_id.components().as_slice() == KEY_BAG_OID =>
        {
            Some(other.bag_value)
        }
        _ => None,
    }))
}
