use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::OAuth2Config;
use crate::error::KeyError;
use crate::keys::KeyManager;
use crate::model::{random_token_value, ttl, Token, User};
use crate::scope::{Scope, Scopes};

/// Successful token endpoint response (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn new(token: &Token, now: DateTime<Utc>, id_token: Option<String>) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_type: "Bearer".into(),
            expires_in: token.expires_in(now),
            scope: token.scopes.to_string(),
            refresh_token: token.refresh_token.clone(),
            id_token,
        }
    }
}

/// OpenID Connect ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    /// User id.
    pub sub: String,
    /// Client id.
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

/// Mints access/refresh token rows and signs ID tokens.
pub(crate) struct TokenService {
    keys: Arc<KeyManager>,
    config: OAuth2Config,
}

impl TokenService {
    pub fn new(keys: Arc<KeyManager>, config: OAuth2Config) -> Self {
        Self { keys, config }
    }

    /// Build a fresh token row. The caller persists it.
    pub fn mint(
        &self,
        client_id: &str,
        user_id: Option<Uuid>,
        scopes: Scopes,
        with_refresh: bool,
        now: DateTime<Utc>,
    ) -> Token {
        let with_refresh = with_refresh && self.config.refresh_enabled;
        let refresh_expires_at = match self.config.refresh_ttl_secs {
            0 => None,
            secs => Some(now + ttl(secs)),
        };
        Token {
            id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            user_id,
            access_token: random_token_value(),
            refresh_token: with_refresh.then(random_token_value),
            scopes,
            issued_at: now,
            expires_at: now + ttl(self.config.access_ttl_secs),
            refresh_expires_at: refresh_expires_at.filter(|_| with_refresh),
        }
    }

    /// Whether an ID token should accompany a grant with these scopes.
    pub fn wants_id_token(&self, scopes: &Scopes) -> bool {
        scopes.contains(Scope::OpenId) && self.keys.is_openid_connect_available()
    }

    pub fn id_token(
        &self,
        client_id: &str,
        user: &User,
        scopes: &Scopes,
        nonce: Option<&str>,
        auth_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<String, KeyError> {
        let profile = scopes.contains(Scope::Profile);
        let claims = IdTokenClaims {
            iss: self.keys.issuer().to_string(),
            sub: user.id.to_string(),
            aud: client_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl(self.config.id_token_ttl_secs)).timestamp(),
            auth_time: auth_time.timestamp(),
            nonce: nonce.map(str::to_string),
            name: profile.then(|| user.display_name.clone()),
            preferred_username: profile.then(|| user.name.clone()),
        };
        self.keys.sign(&claims)
    }
}
