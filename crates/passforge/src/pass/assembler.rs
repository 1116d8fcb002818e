//! Pass assembly.
//!
//! Turns a template snapshot and caller field values into the final
//! `pass.json` plus image files. Business data (colors, copy, labels,
//! values) comes only from the template and the caller. The assembler
//! fills in nothing but the technical keys a pass cannot be signed without.

use super::assets::decode_assets;
use super::validate::{ensure_pass_type_identifier, validate_pass};
use crate::certificate::SigningCertificate;
use crate::config::EngineConfig;
use crate::placeholder::{default_as_text, substitute};
use crate::security::scrub_forbidden_keys;
use crate::template::{TemplateSnapshot, EMBEDDED_PLACEHOLDERS_KEY};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the pass document inside a package.
pub const PASS_JSON_FILE: &str = "pass.json";

/// The in-memory file set of one pass, ready to be written and signed.
#[derive(Debug, Clone)]
pub struct AssembledPass {
    /// Final `pass.json` document.
    pub pass_json: Map<String, Value>,

    /// Image files by package file name (`icon.png`, `logo@2x.png`, ...).
    pub assets: BTreeMap<String, Vec<u8>>,

    /// Freshly assigned serial number.
    pub serial_number: String,

    /// Placeholder values actually substituted: template defaults overlaid
    /// with caller values.
    pub field_values: BTreeMap<String, String>,

    /// The pass style key present in `pass_json`.
    pub style: &'static str,
}

impl AssembledPass {
    /// Identifier declared by (and asserted on) the document.
    pub fn pass_type_identifier(&self) -> &str {
        self.pass_json
            .get("passTypeIdentifier")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Serialized `pass.json`.
    pub fn pass_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.pass_json)?)
    }

    /// Write `pass.json` and every image into `payload_path`.
    pub fn write_to(&self, payload_path: impl AsRef<Path>) -> Result<()> {
        let payload_path = payload_path.as_ref();
        fs::write(payload_path.join(PASS_JSON_FILE), self.pass_json_bytes()?)?;
        for (name, bytes) in &self.assets {
            fs::write(payload_path.join(name), bytes)?;
        }
        Ok(())
    }
}

/// Builds [`AssembledPass`]es.
#[derive(Debug, Clone)]
pub struct PassAssembler {
    fallback_organization_name: String,
    fallback_description: String,
}

impl Default for PassAssembler {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl PassAssembler {
    /// Create an assembler with the given generic fallbacks.
    pub fn new(fallback_organization_name: impl Into<String>, fallback_description: impl Into<String>) -> Self {
        Self {
            fallback_organization_name: fallback_organization_name.into(),
            fallback_description: fallback_description.into(),
        }
    }

    /// Create an assembler using the fallbacks from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.fallback_organization_name.clone(),
            config.fallback_description.clone(),
        )
    }

    /// Assemble a pass.
    ///
    /// The steps, in order:
    ///
    /// 1. Copy the template document; merge placeholder defaults with
    ///    `field_values` (caller wins).
    /// 2. Drop the embedded placeholder map from the document.
    /// 3. Substitute `${KEY}` tokens in string leaves. Any token left
    ///    unresolved fails the assembly.
    /// 4. Scrub certificate and key shaped keys.
    /// 5. Assign a new serial number.
    /// 6. Backfill `formatVersion`, `passTypeIdentifier`, `teamIdentifier`,
    ///    `organizationName` and `description` when absent.
    /// 7. Assert the document's `passTypeIdentifier` equals the certificate's.
    /// 8. Validate structure, then decode the images.
    pub fn assemble(
        &self,
        snapshot: &TemplateSnapshot,
        field_values: &BTreeMap<String, String>,
        certificate: &SigningCertificate,
    ) -> Result<AssembledPass> {
        let mut working = snapshot.pass_json_snapshot.clone();

        let mut actual: BTreeMap<String, String> = snapshot
            .default_placeholders()
            .iter()
            .map(|(key, value)| (key.clone(), default_as_text(value)))
            .collect();
        for (key, value) in field_values {
            actual.insert(key.clone(), value.clone());
        }

        working.shift_remove(EMBEDDED_PLACEHOLDERS_KEY);

        let mut document = Value::Object(working);
        let unresolved = substitute(&mut document, &actual);
        if !unresolved.is_empty() {
            return Err(Error::TemplateInvalid(format!(
                "Unresolved placeholders: {}",
                unresolved.join(", ")
            )));
        }

        scrub_forbidden_keys(&mut document);

        let Value::Object(mut pass) = document else {
            return Err(Error::TemplateInvalid("pass JSON must be an object".into()));
        };

        let serial_number = Uuid::new_v4().to_string();
        pass.insert("serialNumber".into(), Value::String(serial_number.clone()));

        self.backfill(&mut pass, certificate);

        ensure_pass_type_identifier(&pass, &certificate.pass_type_identifier)?;
        let style = validate_pass(&pass)?;
        let assets = decode_assets(&snapshot.images)?;

        debug!(
            template = %snapshot.id,
            style,
            assets = assets.len(),
            "assembled pass"
        );

        Ok(AssembledPass {
            pass_json: pass,
            assets,
            serial_number,
            field_values: actual,
            style,
        })
    }

    fn backfill(&self, pass: &mut Map<String, Value>, certificate: &SigningCertificate) {
        fn absent(pass: &Map<String, Value>, key: &str) -> bool {
            pass.get(key).map_or(true, Value::is_null)
        }

        if absent(pass, "formatVersion") {
            pass.insert("formatVersion".into(), Value::from(1));
        }
        if absent(pass, "passTypeIdentifier") {
            pass.insert(
                "passTypeIdentifier".into(),
                Value::String(certificate.pass_type_identifier.clone()),
            );
        }
        match pass.get("teamIdentifier").and_then(Value::as_str) {
            Some(team) if team != certificate.team_identifier => {
                warn!(
                    declared = team,
                    certificate = %certificate.team_identifier,
                    "pass teamIdentifier differs from certificate"
                );
            }
            Some(_) => {}
            None => {
                if absent(pass, "teamIdentifier") {
                    pass.insert(
                        "teamIdentifier".into(),
                        Value::String(certificate.team_identifier.clone()),
                    );
                }
            }
        }
        if absent(pass, "organizationName") {
            let name = certificate
                .organization_name_default
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| self.fallback_organization_name.clone());
            pass.insert("organizationName".into(), Value::String(name));
        }
        if absent(pass, "description") {
            pass.insert(
                "description".into(),
                Value::String(self.fallback_description.clone()),
            );
        }
    }
}
