//! `manifest.json` generation for pass payloads.
//!
//! Hashes every file in the payload directory with SHA-1. The manifest is
//! what the detached signature covers, so it must list exactly the files
//! that end up in the archive.

use crate::{Error, Result};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Name of the manifest file inside a package.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Name of the detached signature file inside a package.
pub const SIGNATURE_FILE: &str = "signature";

/// Builder for a payload directory's manifest.
pub struct ManifestBuilder {
    /// Root payload path
    payload_path: PathBuf,
    /// Relative path to hex SHA-1
    files: BTreeMap<String, String>,
}

impl ManifestBuilder {
    /// Create a new manifest builder for the given payload directory
    pub fn new(payload_path: impl AsRef<Path>) -> Self {
        Self {
            payload_path: payload_path.as_ref().to_path_buf(),
            files: BTreeMap::new(),
        }
    }

    fn should_exclude(relative_path: &str) -> bool {
        relative_path == MANIFEST_FILE
            || relative_path == SIGNATURE_FILE
            || is_host_metadata(relative_path)
    }

    /// Walk the payload and hash all files.
    ///
    /// Symlinks are rejected; a payload is always plain files written by
    /// this crate.
    pub fn scan(&mut self) -> Result<&mut Self> {
        let payload_path = self.payload_path.clone();

        // WalkDir is not Send, so collect first
        let entries: Vec<_> = WalkDir::new(&payload_path)
            .follow_links(false)
            .into_iter()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Io(std::io::Error::other(format!("Failed to walk payload: {}", e))))?;

        let results: Vec<(String, String)> = entries
            .par_iter()
            .filter_map(|entry| {
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    return None;
                }
                let relative_path = match relative_name(&payload_path, entry.path()) {
                    Ok(name) => name,
                    Err(e) => return Some(Err(e)),
                };
                if Self::should_exclude(&relative_path) {
                    return None;
                }
                if file_type.is_symlink() {
                    return Some(Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Symlink in payload: {}", relative_path),
                    ))));
                }
                Some(fs::read(entry.path()).map(|data| (relative_path, sha1_hex(&data))).map_err(Error::Io))
            })
            .collect::<Result<_>>()?;

        // BTreeMap is not thread-safe, insert sequentially
        for (path, digest) in results {
            self.files.insert(path, digest);
        }

        debug!(files = self.files.len(), "hashed payload");
        Ok(self)
    }

    /// Serialize the manifest as JSON bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.files)?)
    }

    /// Serialize the manifest and write it into the payload directory.
    ///
    /// Returns the bytes written, which are what gets signed.
    pub fn write(&self) -> Result<Vec<u8>> {
        let bytes = self.build()?;
        fs::write(self.payload_path.join(MANIFEST_FILE), &bytes)?;
        Ok(bytes)
    }

    /// Get hashed entries
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// Get the number of hashed files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Whether a relative payload path is host filesystem metadata
/// (`.DS_Store`, `__MACOSX/`, `._*` forks, `Thumbs.db`, dotfiles).
pub fn is_host_metadata(relative_path: &str) -> bool {
    relative_path.split('/').any(|component| {
        component.starts_with('.')
            || component == "__MACOSX"
            || component.eq_ignore_ascii_case("Thumbs.db")
            || component.eq_ignore_ascii_case("desktop.ini")
    })
}

pub(crate) fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Failed to compute relative path",
        ))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
