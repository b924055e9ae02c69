use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::api::constants::{self, API_VERSION, DEFAULT_TOKEN_URL};
use crate::api::models::Credentials;

/// Tap configuration as read from the JSON config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    pub start_date: String,
    pub organization_uri: String,
    pub user_agent: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
    /// Logical name of the entity to extract
    pub object: String,
    #[serde(default)]
    pub max_pagesize: Option<u32>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default)]
    pub error_file_path: Option<PathBuf>,
    #[serde(default = "default_error_start_marker")]
    pub error_start_marker: String,
    #[serde(default = "default_error_end_marker")]
    pub error_end_marker: String,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

pub const DEFAULT_ERROR_START_MARKER: &str = "[tap_error_start]";
pub const DEFAULT_ERROR_END_MARKER: &str = "[tap_error_end]";

fn default_error_start_marker() -> String {
    DEFAULT_ERROR_START_MARKER.to_string()
}

fn default_error_end_marker() -> String {
    DEFAULT_ERROR_END_MARKER.to_string()
}

impl TapConfig {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_json(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            refresh_token: self.refresh_token.clone(),
            organization_uri: self.organization_uri.clone(),
        }
    }

    /// Page size actually requested, never above the service ceiling
    pub fn pagesize(&self) -> u32 {
        constants::effective_pagesize(self.max_pagesize)
    }
}

/// On-disk config file that receives rotated refresh tokens
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replace `refresh_token` in the config file, keeping every other key as-is
    pub fn update_refresh_token(&self, refresh_token: &str) -> io::Result<()> {
        let content = fs::read_to_string(&self.path)?;
        let mut document: Value = serde_json::from_str(&content)?;

        let object = document.as_object_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "config file is not a JSON object")
        })?;
        object.insert(
            "refresh_token".to_string(),
            Value::String(refresh_token.to_string()),
        );

        write_json_atomic(&self.path, &document)?;
        info!("Credentials Refreshed");
        Ok(())
    }
}

/// Write JSON next to `path` and rename it into place
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    debug!("Wrote {:?}", path);
    Ok(())
}
