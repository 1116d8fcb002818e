//! Detached CMS signature over a pass manifest.
//!
//! Uses the cryptographic-message-syntax crate for `SignedData` generation.
//! The signature carries the three standard signed attributes (content-type,
//! message-digest, signing-time), uses SHA-256 as digest algorithm, and
//! includes both the signer certificate and the WWDR intermediate.

use crate::{Error, Result};
use cryptographic_message_syntax::{SignedData, SignedDataBuilder, SignerBuilder};
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::Path;
use x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair};

/// Everything needed to sign a manifest.
pub struct SignerMaterial {
    /// Leaf certificate of the pass-type identity.
    pub certificate: CapturedX509Certificate,
    /// Private key matching `certificate`.
    pub signing_key: InMemorySigningKeyPair,
    /// WWDR intermediate certificate.
    pub wwdr: CapturedX509Certificate,
}

impl SignerMaterial {
    /// Load signer material from PEM strings and WWDR bytes (PEM or DER).
    pub fn from_pem(certificate_pem: &str, private_key_pem: &SecretString, wwdr: &[u8]) -> Result<Self> {
        let certificate = CapturedX509Certificate::from_pem(certificate_pem.as_bytes())
            .map_err(|e| Error::ManifestSigning(format!("Failed to parse signer certificate: {}", e)))?;

        let key = pem::parse(private_key_pem.expose_secret().as_bytes())
            .map_err(|e| Error::ManifestSigning(format!("Failed to parse private key PEM: {}", e)))?;
        let signing_key = InMemorySigningKeyPair::from_pkcs8_der(key.contents())
            .map_err(|e| Error::ManifestSigning(format!("Failed to load private key: {}", e)))?;

        let wwdr = load_wwdr(wwdr)?;

        Ok(Self {
            certificate,
            signing_key,
            wwdr,
        })
    }

    /// Load signer material from files written to a certificate work directory.
    pub fn from_pem_files(
        certificate_path: impl AsRef<Path>,
        private_key_path: impl AsRef<Path>,
        wwdr_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let certificate_pem = fs::read_to_string(certificate_path)?;
        let private_key_pem = SecretString::new(fs::read_to_string(private_key_path)?);
        let wwdr = fs::read(wwdr_path)?;
        Self::from_pem(&certificate_pem, &private_key_pem, &wwdr)
    }
}

fn load_wwdr(data: &[u8]) -> Result<CapturedX509Certificate> {
    CapturedX509Certificate::from_pem(data)
        .or_else(|_| CapturedX509Certificate::from_der(data.to_vec()))
        .map_err(|e| Error::ManifestSigning(format!("Failed to parse WWDR certificate: {}", e)))
}

/// Produce a DER-encoded detached CMS signature over `manifest`.
///
/// The manifest bytes are hashed but not embedded. The signer certificate is
/// added to the certificate set by the builder; the WWDR certificate is added
/// explicitly.
pub fn sign_manifest(manifest: &[u8], material: &SignerMaterial) -> Result<Vec<u8>> {
    // SignerBuilder defaults to SHA-256.
    let signer = SignerBuilder::new(&material.signing_key, material.certificate.clone());

    let der = SignedDataBuilder::default()
        .content_external(manifest.to_vec())
        .signer(signer)
        .certificate(material.wwdr.clone())
        .build_der()
        .map_err(|e| Error::ManifestSigning(format!("Failed to build CMS signature: {}", e)))?;

    if der.is_empty() {
        return Err(Error::ManifestSigning("CMS builder produced no bytes".into()));
    }

    Ok(der)
}

/// Summary of a verified detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    /// Number of signers.
    pub signers: usize,
    /// Number of certificates carried in the certificate set.
    pub certificates: usize,
}

/// Verify a detached signature against the manifest bytes it covers.
///
/// Checks every signer's signature and message digest. Chain trust is not
/// evaluated.
pub fn verify_signature(signature: &[u8], manifest: &[u8]) -> Result<SignatureInfo> {
    let signed_data = SignedData::parse_ber(signature)
        .map_err(|e| Error::ManifestSigning(format!("Failed to parse signature: {}", e)))?;

    if signed_data.signed_content().is_some() {
        return Err(Error::ManifestSigning("Signature is not detached".into()));
    }

    let mut signers = 0;
    for signer in signed_data.signers() {
        signer
            .verify_signature_with_signed_data(&signed_data)
            .map_err(|e| Error::ManifestSigning(format!("Signature does not verify: {}", e)))?;
        signer
            .verify_message_digest_with_content(manifest)
            .map_err(|e| Error::ManifestSigning(format!("Manifest digest does not match: {}", e)))?;
        signers += 1;
    }
    if signers == 0 {
        return Err(Error::ManifestSigning("Signature has no signers".into()));
    }

    Ok(SignatureInfo {
        signers,
        certificates: signed_data.certificates().count(),
    })
}
