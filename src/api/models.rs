use chrono::{DateTime, Duration, Utc};

use super::constants::TOKEN_EXPIRY_MARGIN_SECS;

/// OAuth client credentials for one organization.
///
/// The refresh token is the only mutable part: the identity endpoint may rotate
/// it on any refresh, and the rotated value replaces this one.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
    pub organization_uri: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("organization_uri", &self.organization_uri)
            .finish_non_exhaustive()
    }
}

/// Cached bearer token. Never persisted.
#[derive(Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(access_token: String, expires_in_secs: i64, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at: issued_at + Duration::seconds(expires_in_secs),
        }
    }

    /// True once `now` has reached the expiry minus the drift margin
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_valid_until_margin() {
        let issued = Utc::now();
        let token = TokenInfo::new("abc".to_string(), 3600, issued);

        assert!(!token.is_expired_at(issued));
        assert!(!token.is_expired_at(issued + Duration::seconds(3589)));
        assert!(token.is_expired_at(issued + Duration::seconds(3590)));
        assert!(token.is_expired_at(issued + Duration::seconds(4000)));
    }

    #[test]
    fn test_short_lived_token_is_already_expired() {
        let issued = Utc::now();
        let token = TokenInfo::new("abc".to_string(), 5, issued);
        assert!(token.is_expired_at(issued));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials {
            client_id: "id".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "https://localhost".to_string(),
            refresh_token: "rt-secret".to_string(),
            organization_uri: "https://org.crm.dynamics.com".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("shh"));
        assert!(!rendered.contains("rt-secret"));
    }
}
