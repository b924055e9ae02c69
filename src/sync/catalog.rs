//! Stream catalog produced by discovery and read back for selection

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const INCREMENTAL: &str = "INCREMENTAL";
pub const FULL_TABLE: &str = "FULL_TABLE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub stream: String,
    pub tap_stream_id: String,
    pub schema: Value,
    #[serde(default)]
    pub key_properties: Vec<String>,
    #[serde(default)]
    pub replication_method: Option<String>,
    #[serde(default)]
    pub replication_key: Option<String>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// Metadata attached to the stream (empty breadcrumb) or to one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub breadcrumb: Vec<String>,
    pub metadata: Map<String, Value>,
}

impl MetadataEntry {
    pub fn stream(metadata: Map<String, Value>) -> Self {
        Self {
            breadcrumb: Vec::new(),
            metadata,
        }
    }

    pub fn property(name: &str, metadata: Map<String, Value>) -> Self {
        Self {
            breadcrumb: vec!["properties".to_string(), name.to_string()],
            metadata,
        }
    }
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog from: {:?}", path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {:?}", path))
    }

    /// Selected streams, rotated so an interrupted stream resumes first
    pub fn selected_streams(&self, currently_syncing: Option<&str>) -> Vec<&CatalogEntry> {
        let selected: Vec<&CatalogEntry> = self.streams.iter().filter(|s| s.is_selected()).collect();

        let resume_at = currently_syncing
            .and_then(|id| selected.iter().position(|s| s.tap_stream_id == id))
            .unwrap_or(0);

        let (before, after) = selected.split_at(resume_at);
        after.iter().chain(before.iter()).copied().collect()
    }
}

impl CatalogEntry {
    fn metadata_at(&self, breadcrumb: &[&str]) -> Option<&Map<String, Value>> {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.iter().map(String::as_str).eq(breadcrumb.iter().copied()))
            .map(|m| &m.metadata)
    }

    pub fn stream_metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata_at(&[])
    }

    pub fn property_metadata(&self, name: &str) -> Option<&Map<String, Value>> {
        self.metadata_at(&["properties", name])
    }

    pub fn is_selected(&self) -> bool {
        self.stream_metadata()
            .and_then(|m| m.get("selected"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_incremental(&self) -> bool {
        self.replication_method.as_deref() == Some(INCREMENTAL) && self.replication_key.is_some()
    }

    /// Unsupported columns are never synced, automatic ones always; the rest follow `selected`
    pub fn should_sync_column(&self, name: &str) -> bool {
        let metadata = self.property_metadata(name);
        let inclusion = metadata.and_then(|m| m.get("inclusion")).and_then(Value::as_str);
        let selected = metadata.and_then(|m| m.get("selected")).and_then(Value::as_bool);

        match inclusion {
            Some("unsupported") => false,
            Some("automatic") => true,
            _ => selected.unwrap_or(true),
        }
    }

    /// Schema property names in the order the catalog document lists them
    pub fn property_names(&self) -> Vec<String> {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Columns to request and emit for this stream
    pub fn desired_columns(&self) -> Vec<String> {
        self.property_names()
            .into_iter()
            .filter(|name| self.should_sync_column(name))
            .collect()
    }
}
