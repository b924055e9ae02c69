//! Collection page payloads returned by the Web API

use log::warn;
use serde_json::Value;

use crate::api::constants::NEXT_LINK_FIELD;
use crate::api::error::DynamicsError;

/// One page of a collection read
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub value: Vec<Value>,
    pub next_link: Option<String>,
}

impl QueryResponse {
    /// Parse a page body. A body without `value` is treated as an empty page.
    pub fn from_json(json: Value) -> Result<Self, DynamicsError> {
        let mut body = match json {
            Value::Object(body) => body,
            other => {
                return Err(DynamicsError::Unclassified(format!(
                    "expected a JSON object page, got: {}",
                    other
                )));
            }
        };

        let value = match body.remove("value") {
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(DynamicsError::Unclassified(format!(
                    "'value' is not an array: {}",
                    other
                )));
            }
            None => {
                warn!("Page has no 'value' array, treating as empty");
                Vec::new()
            }
        };

        let next_link = body
            .get(NEXT_LINK_FIELD)
            .and_then(|n| n.as_str())
            .map(|s| s.to_string());

        Ok(Self { value, next_link })
    }

    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
