use anyhow::Context;
use log::info;
use reqwest::Method;
use reqwest::header::{
    AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, IF_NONE_MATCH, RETRY_AFTER, USER_AGENT,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::auth::TokenManager;
use super::constants::{self, headers};
use super::error::{DynamicsError, parse_retry_after};
use super::request::RequestContext;
use super::resilience::{ResilienceConfig, RetryPolicy, Sleeper, TokioSleeper};
use crate::config::{ConfigStore, TapConfig};

/// Resolved connection settings for one organization
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub organization_uri: String,
    pub api_version: String,
    pub user_agent: String,
    pub pagesize: u32,
}

impl ClientSettings {
    pub fn from_config(config: &TapConfig) -> Self {
        Self {
            organization_uri: config.organization_uri.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            user_agent: config.user_agent.clone(),
            pagesize: config.pagesize(),
        }
    }
}

/// Dynamics 365 Web API client.
///
/// Every call goes through two nested retry layers: server-dictated waits for
/// HTTP 429 on the outside, exponential backoff for other transient failures inside.
/// Calls are issued one at a time; the token manager sits behind an async mutex only
/// because refreshing needs `&mut` while callers hold `&self`.
pub struct DynamicsClient {
    settings: ClientSettings,
    http_client: reqwest::Client,
    token_manager: Mutex<TokenManager>,
    transient_policy: RetryPolicy,
    rate_limit_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl DynamicsClient {
    pub fn new(settings: ClientSettings, http_client: reqwest::Client, token_manager: TokenManager) -> Self {
        let resilience = ResilienceConfig::default();
        Self {
            settings,
            http_client,
            token_manager: Mutex::new(token_manager),
            transient_policy: resilience.transient_policy(),
            rate_limit_policy: resilience.rate_limit_policy(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Build a client from the tap config; rotated refresh tokens are written back to `config_path`
    pub fn from_config(config: &TapConfig, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let http_client = build_http_client()?;

        let mut token_manager =
            TokenManager::new(http_client.clone(), &config.token_url, config.credentials());
        if let Some(path) = config_path {
            token_manager = token_manager.with_store(ConfigStore::new(path));
        }

        Ok(Self::new(ClientSettings::from_config(config), http_client, token_manager))
    }

    /// Replace the retry layers
    pub fn with_resilience(mut self, resilience: &ResilienceConfig) -> Self {
        self.transient_policy = resilience.transient_policy();
        self.rate_limit_policy = resilience.rate_limit_policy();
        self
    }

    /// Replace the suspension used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Refresh token currently held in memory
    pub async fn current_refresh_token(&self) -> String {
        self.token_manager.lock().await.refresh_token().to_string()
    }

    /// Absolute URL for a request
    pub fn resolve_url(&self, context: &RequestContext) -> String {
        if context.is_paging {
            context.endpoint.clone()
        } else {
            constants::entity_endpoint(
                &self.settings.organization_uri,
                &self.settings.api_version,
                &context.endpoint,
            )
        }
    }

    /// Execute a request with both retry layers applied
    pub async fn execute(&self, context: &RequestContext) -> Result<Value, DynamicsError> {
        let transient = &self.transient_policy;
        let sleeper = &*self.sleeper;

        self.rate_limit_policy
            .execute(sleeper, move || {
                transient.execute(sleeper, move || self.attempt(context))
            })
            .await
    }

    /// Execute a read, translating exhausted HTTP errors into the service's own message
    pub async fn get(&self, context: &RequestContext) -> Result<Value, DynamicsError> {
        self.execute(context)
            .await
            .map_err(DynamicsError::into_api_error)
    }

    async fn attempt(&self, context: &RequestContext) -> Result<Value, DynamicsError> {
        let url = self.resolve_url(context);

        info!(
            "{} - Making request to {} endpoint {}, with params {:?}",
            url,
            context.method.to_uppercase(),
            if context.is_paging {
                constants::NEXT_LINK_FIELD
            } else {
                context.endpoint.as_str()
            },
            context.params,
        );

        let access_token = {
            let mut token_manager = self.token_manager.lock().await;
            token_manager.ensure_valid_token().await?.access_token.clone()
        };

        let mut request_headers = self.standard_headers(&access_token)?;
        for (name, value) in &context.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DynamicsError::Unclassified(format!("invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| DynamicsError::Unclassified(format!("invalid header value: {}", e)))?;
            request_headers.insert(name, value);
        }

        let method = Method::from_bytes(context.method.to_uppercase().as_bytes())
            .map_err(|e| DynamicsError::Unclassified(format!("invalid method: {}", e)))?;

        let mut request = self.http_client.request(method, &url).headers(request_headers);
        if !context.params.is_empty() {
            request = request.query(&context.params);
        }
        if let Some(body) = &context.body {
            request = request.body(body.clone());
        }

        let organization_uri = &self.settings.organization_uri;
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.classify_transport(e).await),
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = response
            .text()
            .await
            .map_err(|e| DynamicsError::from_transport(e, organization_uri))?;

        let text = DynamicsError::check_status(status, retry_after, text)?;

        let parsed: Result<Value, _> = serde_json::from_str(&text);
        Ok(parsed.unwrap_or_else(|_| Value::String(text)))
    }

    /// A connect failure against a host that does not resolve is a bad organization URI
    async fn classify_transport(&self, error: reqwest::Error) -> DynamicsError {
        let organization_uri = &self.settings.organization_uri;
        if error.is_connect() && !host_resolves(error.url()).await {
            return DynamicsError::InvalidUrl(organization_uri.clone());
        }
        DynamicsError::from_transport(error, organization_uri)
    }

    fn standard_headers(&self, access_token: &str) -> Result<HeaderMap, DynamicsError> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| {
            DynamicsError::Unclassified(format!("invalid header value: {}", e))
        };

        let mut map = HeaderMap::new();
        map.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", access_token)).map_err(invalid)?,
        );
        map.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.settings.user_agent).map_err(invalid)?,
        );
        map.insert(
            HeaderName::from_static("odata-maxversion"),
            HeaderValue::from_static(headers::ODATA_VERSION),
        );
        map.insert(
            HeaderName::from_static("odata-version"),
            HeaderValue::from_static(headers::ODATA_VERSION),
        );
        map.insert(
            IF_NONE_MATCH,
            HeaderValue::from_static(headers::IF_NONE_MATCH_NULL),
        );
        Ok(map)
    }
}

async fn host_resolves(url: Option<&reqwest::Url>) -> bool {
    let Some(url) = url else {
        return true;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let port = url.port_or_known_default().unwrap_or(443);

    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.next().is_some(),
        Err(_) => false,
    }
}

/// Shared HTTP client with connection pooling
pub fn build_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}
