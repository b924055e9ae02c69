use chrono::Utc;
use log::{debug, info};
use serde_json::Value;

use super::error::DynamicsError;
use super::models::{Credentials, TokenInfo};
use crate::config::ConfigStore;

/// Owns the access token lifecycle for one organization.
///
/// Tokens are refreshed lazily through the OAuth refresh-token grant. When the
/// identity endpoint rotates the refresh token, the new value is written to the
/// config file before it is used for anything else.
pub struct TokenManager {
    http_client: reqwest::Client,
    token_url: String,
    credentials: Credentials,
    token: Option<TokenInfo>,
    store: Option<ConfigStore>,
}

impl TokenManager {
    pub fn new(http_client: reqwest::Client, token_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            credentials,
            token: None,
            store: None,
        }
    }

    /// Persist rotated refresh tokens to this config file
    pub fn with_store(mut self, store: ConfigStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn refresh_token(&self) -> &str {
        &self.credentials.refresh_token
    }

    /// True when no token is held or the held one is inside its drift margin
    pub fn needs_refresh(&self) -> bool {
        match &self.token {
            Some(token) => token.is_expired_at(Utc::now()),
            None => true,
        }
    }

    /// Return a usable access token, refreshing it first if needed
    pub async fn ensure_valid_token(&mut self) -> Result<&TokenInfo, DynamicsError> {
        if self.needs_refresh() {
            let token = self.refresh().await?;
            self.token = Some(token);
        }

        self.token
            .as_ref()
            .ok_or_else(|| DynamicsError::Unclassified("no access token after refresh".to_string()))
    }

    async fn refresh(&mut self) -> Result<TokenInfo, DynamicsError> {
        debug!("Refreshing access token for {}", self.credentials.organization_uri);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
                ("resource", self.credentials.organization_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DynamicsError::from_transport(e, &self.token_url))?;

        debug!("Token request status: {}", response.status());

        if !response.status().is_success() {
            return Err(DynamicsError::AuthInvalid);
        }

        let issued_at = Utc::now();
        let token_data: Value = response.json().await.map_err(|_| DynamicsError::AuthInvalid)?;

        let access_token = token_data
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or(DynamicsError::AuthInvalid)?
            .to_string();

        // Azure AD v1 sends expires_in as a string
        let expires_in = match token_data.get("expires_in") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .ok_or(DynamicsError::AuthInvalid)?;

        if let Some(rotated) = token_data.get("refresh_token").and_then(|t| t.as_str()) {
            if rotated != self.credentials.refresh_token {
                self.rotate_refresh_token(rotated)?;
            }
        }

        info!("Obtained access token valid for {}s", expires_in);
        Ok(TokenInfo::new(access_token, expires_in, issued_at))
    }

    fn rotate_refresh_token(&mut self, refresh_token: &str) -> Result<(), DynamicsError> {
        if let Some(store) = &self.store {
            store
                .update_refresh_token(refresh_token)
                .map_err(DynamicsError::CredentialPersist)?;
        } else {
            debug!("Refresh token rotated; no config file to persist it to");
        }

        self.credentials.refresh_token = refresh_token.to_string();
        Ok(())
    }
}
