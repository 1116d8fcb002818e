//! Template snapshots and the store they are loaded from.
//!
//! A [`TemplateSnapshot`] is the immutable input of one generation: the pass
//! JSON (with its style object and `${KEY}` tokens), the default placeholder
//! values, and base64 image data per asset and density.
//!
//! Snapshots are loaded through the [`TemplateRepository`] trait. The crate
//! ships an in-memory store and a directory store reading `<dir>/<id>.json`.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Key under which a pass JSON may embed its own placeholder defaults.
pub const EMBEDDED_PLACEHOLDERS_KEY: &str = "placeholders";

/// A stored pass template, as served by the template store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSnapshot {
    /// Template identifier.
    pub id: String,

    /// Identifier of the certificate this template is signed with.
    ///
    /// When absent, the `passTypeIdentifier` inside the pass JSON is used.
    #[serde(default)]
    pub pass_type_identifier: Option<String>,

    /// The `pass.json` document with `${KEY}` tokens.
    #[serde(alias = "passJson")]
    pub pass_json_snapshot: Map<String, Value>,

    /// Default placeholder values.
    #[serde(default)]
    pub placeholders: BTreeMap<String, Value>,

    /// Image data: asset name (`icon`, `logo`, ...) to density (`1x`, `2x`, `3x`)
    /// to base64, optionally prefixed with a data-URL header.
    #[serde(default)]
    pub images: BTreeMap<String, BTreeMap<String, String>>,
}

impl TemplateSnapshot {
    /// Parse a snapshot from its JSON representation.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::TemplateInvalid(format!("Failed to parse template snapshot: {}", e)))
    }

    /// Identifier used to look up the signing certificate.
    pub fn declared_pass_type_identifier(&self) -> Option<&str> {
        self.pass_type_identifier
            .as_deref()
            .or_else(|| {
                self.pass_json_snapshot
                    .get("passTypeIdentifier")
                    .and_then(Value::as_str)
            })
            .filter(|id| !id.trim().is_empty())
    }

    /// Default placeholder values, embedded map first, top-level map on top.
    pub fn default_placeholders(&self) -> BTreeMap<String, Value> {
        let mut defaults = BTreeMap::new();
        if let Some(Value::Object(embedded)) = self.pass_json_snapshot.get(EMBEDDED_PLACEHOLDERS_KEY) {
            for (key, value) in embedded {
                defaults.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &self.placeholders {
            defaults.insert(key.clone(), value.clone());
        }
        defaults
    }
}

/// Source of template snapshots.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Load the snapshot with the given id, or `None` if it does not exist.
    async fn load(&self, id: &str) -> Result<Option<TemplateSnapshot>>;
}

/// Template store kept in memory, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<HashMap<String, TemplateSnapshot>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a snapshot.
    pub async fn insert(&self, snapshot: TemplateSnapshot) {
        self.templates
            .write()
            .await
            .insert(snapshot.id.clone(), snapshot);
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn load(&self, id: &str) -> Result<Option<TemplateSnapshot>> {
        Ok(self.templates.read().await.get(id).cloned())
    }
}

/// Template store reading `<root>/<id>.json` files.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateRepository {
    root: PathBuf,
}

impl DirectoryTemplateRepository {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(Error::Repository(format!("Invalid template id: {:?}", id)));
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl TemplateRepository for DirectoryTemplateRepository {
    async fn load(&self, id: &str) -> Result<Option<TemplateSnapshot>> {
        let path = self.path_for(id)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let snapshot = TemplateSnapshot::from_json(&data)?;
        if snapshot.id != id {
            return Err(Error::TemplateInvalid(format!(
                "Template file {} declares id {:?}",
                path.display(),
                snapshot.id
            )));
        }
        Ok(Some(snapshot))
    }
}
