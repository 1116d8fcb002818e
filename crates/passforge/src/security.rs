//! Guards against certificate or key material ending up in a pass.
//!
//! Two checks run on every generation:
//!
//! 1. [`scrub_forbidden_keys`] strips secret-shaped keys from the assembled
//!    `pass.json` tree, at any depth, before anything is hashed.
//! 2. [`assert_payload_clean`] runs right before zipping and fails if any file
//!    in the payload directory looks like a certificate or key.

use crate::bundle::manifest::relative_name;
use crate::{Error, Result};
use serde_json::Value;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// JSON keys that must never survive into a signed `pass.json`.
pub const DENIED_KEYS: &[&str] = &[
    "certificate",
    "certificatePem",
    "privateKey",
    "privateKeyPem",
    "p12",
    "p12Base64",
    "wwdr",
    "wwdrCert",
    "certificate_chain",
];

/// File extensions that mark certificate or key material.
pub const FORBIDDEN_EXTENSIONS: &[&str] = &["pem", "key", "p12", "cer", "crt", "der"];

/// File names that are never allowed in a payload, whatever their extension.
pub const FORBIDDEN_NAMES: &[&str] = &[
    "certificate",
    "private_key",
    "privatekey",
    "signer-cert",
    "signer-key",
    "wwdr",
    "pass.p12",
    "pass.pfx",
];

/// Remove every denied key from `tree`, recursing into objects and arrays.
///
/// Returns the JSON paths of the removed keys.
pub fn scrub_forbidden_keys(tree: &mut Value) -> Vec<String> {
    let mut removed = Vec::new();
    scrub(tree, "$", &mut removed);
    if !removed.is_empty() {
        warn!(keys = ?removed, "removed forbidden keys from pass document");
    }
    removed
}

fn scrub(value: &mut Value, path: &str, removed: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in DENIED_KEYS {
                if map.shift_remove(*key).is_some() {
                    removed.push(format!("{}.{}", path, key));
                }
            }
            for (key, child) in map.iter_mut() {
                scrub(child, &format!("{}.{}", path, key), removed);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter_mut().enumerate() {
                scrub(child, &format!("{}[{}]", path, i), removed);
            }
        }
        _ => {}
    }
}

/// Whether a payload file name is certificate or key shaped.
pub fn is_forbidden_file(name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();

    if let Some((_, extension)) = file_name.rsplit_once('.') {
        if FORBIDDEN_EXTENSIONS.contains(&extension) {
            return true;
        }
    }

    let stem = file_name
        .split_once('.')
        .map_or(file_name.as_str(), |(stem, _)| stem);
    FORBIDDEN_NAMES
        .iter()
        .any(|forbidden| file_name == *forbidden || stem == *forbidden)
}

/// Fail if any file under `payload_path` is certificate or key shaped.
///
/// # Errors
///
/// Returns [`Error::ForbiddenFile`] naming the first offending file.
pub fn assert_payload_clean(payload_path: impl AsRef<Path>) -> Result<()> {
    let payload_path = payload_path.as_ref();

    for entry in WalkDir::new(payload_path).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(format!("Failed to walk payload: {}", e))))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let name = relative_name(payload_path, entry.path())?;
        if is_forbidden_file(&name) {
            return Err(Error::ForbiddenFile(name));
        }
    }

    Ok(())
}
