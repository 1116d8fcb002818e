//! Pass payload directory handling.
//!
//! This module provides functionality to:
//! - Walk a payload directory and hash every file
//! - Generate `manifest.json` with the SHA-1 of each file
//!
//! # Manifest Structure
//!
//! The manifest is a flat JSON object mapping each payload path (relative,
//! `/`-separated) to the lowercase hex SHA-1 of its bytes:
//!
//! ```json
//! {
//!   "icon.png": "4d2f...",
//!   "pass.json": "a91c..."
//! }
//! ```
//!
//! `manifest.json` and `signature` never appear in it.
//!
//! # Examples
//!
//! ```no_run
//! use passforge::bundle::ManifestBuilder;
//!
//! let mut builder = ManifestBuilder::new("/tmp/payload");
//! builder.scan()?;
//! let manifest_bytes = builder.write()?;
//! # Ok::<(), passforge::Error>(())
//! ```

pub mod manifest;

pub use manifest::{is_host_metadata, sha1_hex, ManifestBuilder, MANIFEST_FILE, SIGNATURE_FILE};
