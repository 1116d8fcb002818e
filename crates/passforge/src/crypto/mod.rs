pub mod cms;
pub mod identity;
pub mod pkcs12;

pub use cms::{sign_manifest, verify_signature, SignatureInfo, SignerMaterial};
pub use identity::CertificateIdentity;
pub use pkcs12::{extract_pkcs12, extract_pkcs12_secret, ExtractedCredentials};
