//! Package reading and manifest verification.
//!
//! Reads a `.pkpass` back into memory and re-checks the manifest digests.

use crate::bundle::{is_host_metadata, sha1_hex, MANIFEST_FILE, SIGNATURE_FILE};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use zip::ZipArchive;

/// An unpacked package held in memory.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Entry name to bytes, in sorted order.
    pub files: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Entry names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Raw bytes of an entry.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Parsed `pass.json`.
    pub fn pass_json(&self) -> Result<Value> {
        let data = self.require("pass.json")?;
        Ok(serde_json::from_slice(data)?)
    }

    /// Parsed `manifest.json`.
    pub fn manifest(&self) -> Result<BTreeMap<String, String>> {
        let data = self.require(MANIFEST_FILE)?;
        Ok(serde_json::from_slice(data)?)
    }

    /// DER bytes of the detached signature.
    pub fn signature(&self) -> Option<&[u8]> {
        self.get(SIGNATURE_FILE)
    }

    fn require(&self, name: &str) -> Result<&[u8]> {
        self.get(name).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Package has no {}", name),
            ))
        })
    }
}

/// Largest entry [`read_package`] will unpack.
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Unzip a package into memory.
///
/// # Errors
///
/// Returns [`Error::Zip`] if the bytes are not a ZIP archive, and
/// [`Error::Io`] if an entry escapes the archive root, is larger than
/// [`MAX_ENTRY_BYTES`], or cannot be read.
pub fn read_package(bytes: &[u8]) -> Result<Package> {
    read_package_with_limit(bytes, MAX_ENTRY_BYTES)
}

/// Same as [`read_package`] with a caller-chosen per-entry size limit.
///
/// The limit applies both to the size an entry declares and to the bytes
/// it actually inflates to.
pub fn read_package_with_limit(bytes: &[u8], max_entry_bytes: u64) -> Result<Package> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut package = Package::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = match file.enclosed_name() {
            Some(_) => file.name().to_string(),
            None => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Unsafe entry name in package: {}", file.name()),
                )))
            }
        };

        if file.size() > max_entry_bytes {
            return Err(entry_too_large(&name, file.size(), max_entry_bytes));
        }

        let mut buffer = Vec::new();
        file.by_ref()
            .take(max_entry_bytes.saturating_add(1))
            .read_to_end(&mut buffer)?;
        if buffer.len() as u64 > max_entry_bytes {
            return Err(entry_too_large(&name, buffer.len() as u64, max_entry_bytes));
        }
        package.files.insert(name, buffer);
    }

    Ok(package)
}

fn entry_too_large(name: &str, size: u64, limit: u64) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Package entry {} is {} bytes, limit is {}", name, size, limit),
    ))
}

/// Result of checking a package against its manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManifestCheck {
    /// Listed files whose digest does not match their bytes.
    pub mismatched: Vec<String>,
    /// Listed files absent from the package.
    pub missing: Vec<String>,
    /// Package files the manifest does not list.
    pub unlisted: Vec<String>,
    /// Host metadata entries found in the package.
    pub host_metadata: Vec<String>,
}

impl ManifestCheck {
    /// True when every payload file is listed with the right digest.
    pub fn is_valid(&self) -> bool {
        self.mismatched.is_empty()
            && self.missing.is_empty()
            && self.unlisted.is_empty()
            && self.host_metadata.is_empty()
    }
}

/// Re-hash every file in `package` and compare with its manifest.
pub fn verify_manifest(package: &Package) -> Result<ManifestCheck> {
    let manifest = package.manifest()?;
    let mut check = ManifestCheck::default();

    for (name, digest) in &manifest {
        match package.get(name) {
            Some(data) if sha1_hex(data).eq_ignore_ascii_case(digest) => {}
            Some(_) => check.mismatched.push(name.clone()),
            None => check.missing.push(name.clone()),
        }
    }

    for name in package.names() {
        if name == MANIFEST_FILE || name == SIGNATURE_FILE {
            continue;
        }
        if is_host_metadata(name) {
            check.host_metadata.push(name.to_string());
        } else if !manifest.contains_key(name) {
            check.unlisted.push(name.to_string());
        }
    }

    Ok(check)
}
