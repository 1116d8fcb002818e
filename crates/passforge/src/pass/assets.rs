//! Image assets.
//!
//! Templates carry images as base64 (optionally behind a `data:` URL
//! header), keyed by asset name and density. This module decodes them into
//! the file names a package uses: `icon.png`, `icon@2x.png`, `logo@3x.png`...

use crate::{Error, Result};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use std::collections::BTreeMap;

/// Asset names a pass may carry.
pub const ASSET_NAMES: &[&str] = &["icon", "logo", "strip", "background", "thumbnail"];

/// The one asset every pass must have.
pub const REQUIRED_ASSET: &str = "icon";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Package file name for an asset at a density (`1x`, `2x` or `3x`).
///
/// # Errors
///
/// Returns [`Error::TemplateInvalid`] for an unknown asset name or density.
pub fn asset_file_name(name: &str, density: &str) -> Result<String> {
    if !ASSET_NAMES.contains(&name) {
        return Err(Error::TemplateInvalid(format!("Unknown image asset: {}", name)));
    }
    match density {
        "1x" => Ok(format!("{}.png", name)),
        "2x" | "3x" => Ok(format!("{}@{}.png", name, density)),
        _ => Err(Error::TemplateInvalid(format!(
            "Unknown density {} for image asset {}",
            density, name
        ))),
    }
}

/// Decode base64 image data, with or without a `data:...;base64,` header.
pub fn decode_image(data: &str) -> Result<Vec<u8>> {
    let payload = match data.trim().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| Error::TemplateInvalid("Malformed data URL in image".into()))?,
        None => data,
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(Error::TemplateInvalid("Empty image data".into()));
    }

    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(&cleaned))
        .map_err(|e| Error::TemplateInvalid(format!("Invalid base64 image data: {}", e)))
}

/// Whether `bytes` start with the PNG signature.
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(PNG_SIGNATURE)
}

/// Decode every image of a template into package file names and bytes.
///
/// # Errors
///
/// - [`Error::MissingRequiredAsset`] when there is no `icon` at `1x`
/// - [`Error::TemplateInvalid`] for unknown names or densities and bad data
pub fn decode_assets(images: &BTreeMap<String, BTreeMap<String, String>>) -> Result<BTreeMap<String, Vec<u8>>> {
    let has_icon = images
        .get(REQUIRED_ASSET)
        .and_then(|densities| densities.get("1x"))
        .is_some_and(|data| !data.trim().is_empty());
    if !has_icon {
        return Err(Error::MissingRequiredAsset(format!("{}.png", REQUIRED_ASSET)));
    }

    let mut files = BTreeMap::new();
    for (name, densities) in images {
        for (density, data) in densities {
            let file_name = asset_file_name(name, density)?;
            let bytes = decode_image(data)?;
            if !is_png(&bytes) {
                tracing::warn!(file = %file_name, "image asset is not a PNG");
            }
            files.insert(file_name, bytes);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_base64() -> String {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"IHDR");
        STANDARD.encode(bytes)
    }

    fn images(entries: &[(&str, &str, String)]) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut images: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (name, density, data) in entries {
            images
                .entry(name.to_string())
                .or_default()
                .insert(density.to_string(), data.clone());
        }
        images
    }

    #[test]
    fn test_asset_file_names() {
        assert_eq!(asset_file_name("icon", "1x").unwrap(), "icon.png");
        assert_eq!(asset_file_name("logo", "2x").unwrap(), "logo@2x.png");
        assert_eq!(asset_file_name("strip", "3x").unwrap(), "strip@3x.png");
        assert!(matches!(asset_file_name("avatar", "1x"), Err(Error::TemplateInvalid(_))));
        assert!(matches!(asset_file_name("icon", "4x"), Err(Error::TemplateInvalid(_))));
    }

    #[test]
    fn test_decode_with_data_url_header() {
        let plain = decode_image(&png_base64()).unwrap();
        let prefixed = decode_image(&format!("data:image/png;base64,{}", png_base64())).unwrap();
        assert_eq!(plain, prefixed);
        assert!(is_png(&plain));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image("!!!not base64!!!"), Err(Error::TemplateInvalid(_))));
        assert!(matches!(decode_image("data:image/png;base64,"), Err(Error::TemplateInvalid(_))));
        assert!(matches!(decode_image("data:image/png"), Err(Error::TemplateInvalid(_))));
    }

    #[test]
    fn test_decode_assets() {
        let files = decode_assets(&images(&[
            ("icon", "1x", png_base64()),
            ("icon", "2x", png_base64()),
            ("logo", "3x", png_base64()),
        ]))
        .unwrap();

        let names: Vec<_> = files.keys().cloned().collect();
        assert_eq!(names, vec!["icon.png", "icon@2x.png", "logo@3x.png"]);
    }

    #[test]
    fn test_icon_is_required() {
        let result = decode_assets(&images(&[("logo", "1x", png_base64())]));
        match result {
            Err(Error::MissingRequiredAsset(name)) => assert_eq!(name, "icon.png"),
            other => panic!("unexpected result: {:?}", other.err()),
        }

        let only_retina = decode_assets(&images(&[("icon", "2x", png_base64())]));
        assert!(matches!(only_retina, Err(Error::MissingRequiredAsset(_))));
    }
}
