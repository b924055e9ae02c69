//! Structured failure report for the operator

use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::api::DynamicsError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Full context chain, outermost first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorReport {
    /// The client error closest to the cause supplies the message and code
    pub fn from_error(error: &anyhow::Error) -> Self {
        let dynamics = error.chain().find_map(|e| e.downcast_ref::<DynamicsError>());

        let message = match dynamics {
            Some(err) => err.to_string(),
            None => error.root_cause().to_string(),
        };
        let details = format!("{:#}", error);

        Self {
            code: dynamics.and_then(DynamicsError::code).map(|c| c.to_string()),
            details: (details != message).then_some(details),
            message,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"message\":{:?}}}", self.message))
    }

    /// Write the report to `path` (best effort) and log it between the markers
    pub fn emit(&self, error_file_path: Option<&Path>, start_marker: &str, end_marker: &str) {
        let json = self.to_json();

        if let Some(path) = error_file_path {
            if let Err(e) = fs::write(path, &json) {
                warn!("Could not write error file {:?}: {}", path, e);
            }
        }

        info!("{}{}{}", start_marker, json, end_marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use tempfile::TempDir;

    #[test]
    fn test_report_from_api_error() {
        let result: Result<(), DynamicsError> = Err(DynamicsError::Api {
            code: Some("0x80060888".to_string()),
            message: "Resource not found for the segment 'acounts'.".to_string(),
        });
        let error = result.context("Failed to sync stream account").unwrap_err();

        let report = ErrorReport::from_error(&error);

        assert_eq!(report.code.as_deref(), Some("dynamics.DynamicsApiError"));
        assert_eq!(
            report.message,
            "Import failed with the following MS Dynamics error: (error code: 0x80060888) Resource not found for the segment 'acounts'."
        );
        assert!(report.details.unwrap().starts_with("Failed to sync stream account: "));
    }

    #[test]
    fn test_report_from_auth_error() {
        let error = anyhow::Error::new(DynamicsError::AuthInvalid);
        let report = ErrorReport::from_error(&error);

        assert_eq!(report.code.as_deref(), Some("dynamics.AuthInvalid"));
        assert_eq!(report.details, None);
    }

    #[test]
    fn test_report_from_other_error() {
        let error = anyhow::anyhow!("Failed to read config file: \"missing.json\"");
        let report = ErrorReport::from_error(&error);

        assert_eq!(report.code, None);
        assert_eq!(report.to_json(), r#"{"message":"Failed to read config file: \"missing.json\""}"#);
    }

    #[test]
    fn test_emit_writes_error_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.json");
        let report = ErrorReport {
            message: "boom".to_string(),
            code: Some("dynamics.InvalidUrl".to_string()),
            details: None,
        };

        report.emit(Some(&path), "[start]", "[end]");

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["message"], "boom");
        assert_eq!(written["code"], "dynamics.InvalidUrl");
    }

    #[test]
    fn test_emit_ignores_unwritable_path() {
        let report = ErrorReport {
            message: "boom".to_string(),
            code: None,
            details: None,
        };
        report.emit(Some(Path::new("/nonexistent/dir/error.json")), "[start]", "[end]");
    }
}
