//! Wallet pass packaging and signing engine.
//!
//! Given a stored template snapshot, per-request field values and a
//! pass-type signing certificate, produces a signed `.pkpass`: a ZIP with
//! `pass.json`, image assets, a SHA-1 `manifest.json`, and a detached CMS
//! `signature` over that manifest.
//!
//! # Modules
//!
//! - [`placeholder`] - `${KEY}` extraction, validation and substitution
//! - [`template`] - template snapshots and where they are loaded from
//! - [`certificate`] - certificate records, sources and resolution
//! - [`crypto`] - PKCS#12 extraction, certificate identity, CMS signing
//! - [`pass`] - `pass.json` assembly and validation
//! - [`bundle`] - payload manifest
//! - [`security`] - guards against leaking key material into a pass
//! - [`pkpass`] - package archive creation and reading
//! - [`generator`] - the end-to-end pipeline
//!
//! # Examples
//!
//! ```no_run
//! use passforge::certificate::JsonFileCertificateRepository;
//! use passforge::template::DirectoryTemplateRepository;
//! use passforge::{EngineConfig, PassGenerator, PassRequest};
//! use std::sync::Arc;
//!
//! # async fn run() -> passforge::Result<()> {
//! let config = EngineConfig::load("passforge.toml")?;
//! let templates = Arc::new(DirectoryTemplateRepository::new("templates"));
//! let certificates = Arc::new(JsonFileCertificateRepository::open("certificates.json").await?);
//!
//! let generator = PassGenerator::from_config(templates, certificates, config)?;
//! let pass = generator
//!     .generate(PassRequest::new("loyalty").field("FIRST_NAME", "Jane").tenant("acme"))
//!     .await?;
//! println!("{} -> {} bytes", pass.serial_number, pass.bytes.len());
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod certificate;
pub mod config;
pub mod crypto;
pub mod error;
pub mod generator;
pub mod pass;
pub mod pkpass;
pub mod placeholder;
pub mod security;
pub mod template;

pub use certificate::{CertificateResolver, SigningCertificate};
pub use config::{BlobStoreConfig, EngineConfig};
pub use error::Error;
pub use generator::{GeneratedPass, PassGenerator, PassRequest};
pub use pkpass::CompressionLevel;
pub use placeholder::{extract_placeholders, validate_field_values, ValidationReport};
pub use template::TemplateSnapshot;

pub type Result<T> = std::result::Result<T, Error>;
