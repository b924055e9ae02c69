#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dynamics_tap::api::{DynamicsClient, Sleeper};
use dynamics_tap::config::TapConfig;

pub const TOKEN_PATH: &str = "/common/oauth2/token";
pub const ACCESS_TOKEN: &str = "access-token-1";

/// Records requested waits instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn config_json(server: &MockServer) -> Value {
    json!({
        "start_date": "2023-01-01T00:00:00Z",
        "organization_uri": server.uri(),
        "user_agent": "tap-dynamics test <ops@example.com>",
        "client_id": "client-id",
        "client_secret": "client-secret",
        "redirect_uri": "https://localhost/callback",
        "refresh_token": "refresh-token-1",
        "object": "account",
        "token_url": format!("{}{}", server.uri(), TOKEN_PATH),
        "custom_setting": "kept"
    })
}

pub fn test_config(server: &MockServer) -> TapConfig {
    TapConfig::from_json(&config_json(server).to_string()).unwrap()
}

/// Token endpoint answering with a one-hour token
pub fn token_mock(refresh_token: Option<&str>) -> Mock {
    token_mock_expiring(refresh_token, "3600")
}

pub fn token_mock_expiring(refresh_token: Option<&str>, expires_in: &str) -> Mock {
    let mut body = json!({
        "token_type": "Bearer",
        "access_token": ACCESS_TOKEN,
        "expires_in": expires_in,
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

pub fn client_for(config: &TapConfig, config_path: Option<&Path>, sleeper: Arc<RecordingSleeper>) -> DynamicsClient {
    DynamicsClient::from_config(config, config_path)
        .unwrap()
        .with_sleeper(sleeper)
}

pub async fn setup() -> (MockServer, DynamicsClient, Arc<RecordingSleeper>) {
    let server = MockServer::start().await;
    token_mock(None).mount(&server).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = client_for(&test_config(&server), None, sleeper.clone());
    (server, client, sleeper)
}

pub fn data_path(endpoint: &str) -> String {
    format!("/api/data/v9.2/{}", endpoint)
}

/// Decoded query pairs of a received request
pub fn query_pairs(request: &wiremock::Request) -> Vec<(String, String)> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn query_value(request: &wiremock::Request, name: &str) -> Option<String> {
    query_pairs(request)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// Requests that reached the data API, in arrival order
pub async fn data_requests(server: &MockServer) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/api/data/"))
        .collect()
}

/// Parse line-delimited messages written by a `SingerWriter`
pub fn messages(output: Vec<u8>) -> Vec<Value> {
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
