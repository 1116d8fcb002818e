//! Package archive creation.
//!
//! Creates the `.pkpass` ZIP from a finished payload directory. Every file
//! sits at the archive root (or under its localization folder), with no
//! enclosing folder entry and no host filesystem metadata.
//!
//! For the reverse operation, see the [`extract`](super::extract) module.
//!
//! # Examples
//!
//! ```no_run
//! use passforge::pkpass::{create_pkpass, CompressionLevel};
//!
//! let bytes = create_pkpass("/tmp/payload", CompressionLevel::DEFAULT)?;
//! std::fs::write("card.pkpass", bytes)?;
//! # Ok::<(), passforge::Error>(())
//! ```

use crate::bundle::manifest::relative_name;
use crate::bundle::is_host_metadata;
use crate::{Error, Result};
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// ZIP compression level for package creation.
///
/// Use the provided constants for common use cases, or [`CompressionLevel::new`]
/// for custom levels.
///
/// # Examples
///
/// ```
/// use passforge::pkpass::CompressionLevel;
///
/// let fast = CompressionLevel::NONE;
/// let balanced = CompressionLevel::DEFAULT;
/// let small = CompressionLevel::MAX;
///
/// // Custom levels are clamped to 0-9
/// let custom = CompressionLevel::new(12);
/// assert_eq!(custom.level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0), entries are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn options(&self) -> SimpleFileOptions {
        let options = if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.0 as i64))
        };
        // Fixed timestamp and mode so that the same payload zips the same way.
        options
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Zip the payload directory into an in-memory `.pkpass`.
///
/// Entries are added in sorted path order. Directories get no entries of
/// their own; files in subdirectories keep their relative path.
///
/// # Errors
///
/// Returns [`Error::Io`] if:
/// - The payload directory doesn't exist or is not a directory
/// - The payload contains a symlink
/// - Any file cannot be read
///
/// Returns [`Error::Zip`] if the ZIP archive cannot be written.
pub fn create_pkpass(payload_path: impl AsRef<Path>, compression_level: CompressionLevel) -> Result<Vec<u8>> {
    let payload_path = payload_path.as_ref();

    if !payload_path.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Payload directory not found: {}", payload_path.display()),
        )));
    }

    let options = compression_level.options();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut count = 0usize;

    for entry in WalkDir::new(payload_path)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io(io::Error::other(format!("Failed to walk directory: {}", e))))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let archive_path = relative_name(payload_path, entry.path())?;
        if is_host_metadata(&archive_path) {
            continue;
        }
        if entry.file_type().is_symlink() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Symlink in payload: {}", archive_path),
            )));
        }

        zip.start_file(archive_path.as_str(), options)?;
        zip.write_all(&fs::read(entry.path())?)?;
        count += 1;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(entries = count, size = bytes.len(), "created package");
    Ok(bytes)
}

/// Zip the payload directory and write the package to `output_path`.
pub fn write_pkpass(
    payload_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<()> {
    let output_path = output_path.as_ref();
    let bytes = create_pkpass(payload_path, compression_level)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, bytes)?;
    Ok(())
}
