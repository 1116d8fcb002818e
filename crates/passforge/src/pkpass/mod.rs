//! Pass package (`.pkpass`) handling.
//!
//! Provides functionality for zipping a signed payload directory and for
//! reading a package back to check its manifest.

pub mod archive;
pub mod extract;

pub use archive::{create_pkpass, write_pkpass, CompressionLevel};
pub use extract::{
    read_package, read_package_with_limit, verify_manifest, ManifestCheck, Package, MAX_ENTRY_BYTES,
};
