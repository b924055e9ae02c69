//! Error taxonomy for the Web API client
//!
//! Every failure that crosses the client boundary is one of these variants.
//! Transient variants are retried inside the client; terminal ones abort the run.

use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DynamicsError {
    /// HTTP 5xx
    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// HTTP 4xx other than 429
    #[error("client error ({status}): {body}")]
    Client { status: u16, body: String },

    /// HTTP 429. `retry_after` is the server's `Retry-After` in whole seconds, if sent
    #[error("rate limit exceeded")]
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },

    /// Transport failure before a response was received
    #[error("connection failure: {0}")]
    Connection(#[source] reqwest::Error),

    /// Anything else that went wrong around the HTTP exchange
    #[error("unexpected failure: {0}")]
    Unclassified(String),

    #[error("Failed to connect to MS Dynamics. Please ensure the OAuth token is up to date.")]
    AuthInvalid,

    #[error(
        "Sorry, we couldn't connect to Dynamics URL \"{0}\". Please check the Dynamics URL and try again."
    )]
    InvalidUrl(String),

    /// User-facing translation of an exhausted HTTP error
    #[error("{}", api_error_message(.code.as_deref(), .message))]
    Api {
        code: Option<String>,
        message: String,
    },

    #[error("failed to persist rotated refresh token")]
    CredentialPersist(#[source] std::io::Error),
}

fn api_error_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!(
            "Import failed with the following MS Dynamics error: (error code: {}) {}",
            code, message
        ),
        None => format!("Import failed with the following MS Dynamics error: {}", message),
    }
}

impl DynamicsError {
    /// Classify an HTTP status, handing the body back on success
    pub fn check_status(
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    ) -> Result<String, Self> {
        match status {
            500.. => Err(Self::Server { status, body }),
            429 => Err(Self::RateLimited { retry_after, body }),
            400..=499 => Err(Self::Client { status, body }),
            _ => Ok(body),
        }
    }

    /// Classify a transport error raised by reqwest for a request to `url`.
    ///
    /// A URL that cannot be turned into a request is a configuration problem. Failures on
    /// the wire are retryable connection failures.
    pub fn from_transport(error: reqwest::Error, url: &str) -> Self {
        if error.is_builder() {
            Self::InvalidUrl(url.to_string())
        } else if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
            Self::Connection(error)
        } else {
            Self::Unclassified(error.to_string())
        }
    }

    /// Retried with exponential backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::Client { .. } | Self::Connection(_)
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Raw response text, when the error came from a received response
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Server { body, .. } | Self::Client { body, .. } | Self::RateLimited { body, .. } => {
                Some(body.as_str())
            }
            _ => None,
        }
    }

    /// Stable diagnostic code for the error report
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::AuthInvalid => Some("dynamics.AuthInvalid"),
            Self::InvalidUrl(_) => Some("dynamics.InvalidUrl"),
            Self::Api { .. } => Some("dynamics.DynamicsApiError"),
            _ => None,
        }
    }

    /// Replace an exhausted HTTP error with the service's own `{code, message}`.
    ///
    /// Errors without a usable message in their body come back unchanged.
    pub fn into_api_error(self) -> Self {
        let Some(body) = self.response_body() else {
            return self;
        };

        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|json| json.get("error"));
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string());
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .map(|c| c.to_string());

        match message {
            Some(message) => Self::Api { code, message },
            None => self,
        }
    }
}

/// Parse a `Retry-After` value given in seconds, truncating fractions
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    Some(Duration::from_secs(seconds.max(0.0).floor() as u64))
}
