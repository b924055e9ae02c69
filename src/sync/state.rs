//! Replication bookmarks persisted between runs

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::write_json_atomic;

/// `{"bookmarks": {stream: {key: value}}, "currently_syncing": stream}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    pub currently_syncing: Option<String>,
}

impl State {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading state from: {:?}", path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse state file: {:?}", path))
    }

    /// Empty documents and `{}` both mean no prior state
    pub fn from_json(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).with_context(|| format!("Failed to write state file: {:?}", path))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Bookmark for `stream`, as the string it was stored as
    pub fn bookmark(&self, stream: &str, key: &str) -> Option<&str> {
        self.bookmarks.get(stream)?.get(key)?.as_str()
    }

    pub fn set_bookmark(&mut self, stream: &str, key: &str, value: impl Into<String>) {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn set_currently_syncing(&mut self, stream: Option<&str>) {
        self.currently_syncing = stream.map(|s| s.to_string());
    }
}
