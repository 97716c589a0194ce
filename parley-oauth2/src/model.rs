use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::response_type::ResponseType;
use crate::scope::Scopes;

/// Length of generated access tokens, refresh tokens and authorization codes.
pub const TOKEN_VALUE_LEN: usize = 48;

/// Random alphanumeric credential value.
pub fn random_token_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_VALUE_LEN)
        .map(char::from)
        .collect()
}

/// A TTL in seconds as a duration, capped at a century.
pub(crate) fn ttl(secs: u64) -> Duration {
    const MAX_SECS: u64 = 100 * 365 * 24 * 3600;
    Duration::seconds(secs.min(MAX_SECS) as i64)
}

/// Authenticated resource owner attached to the request by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOwner(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Suspended,
    Deactivated,
}

/// A chat account as seen by the authorization server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    /// Argon2 PHC string; `None` for accounts that cannot log in with a password.
    pub password_hash: Option<String>,
    pub status: UserStatus,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            display_name: name.clone(),
            name,
            password_hash: None,
            status: UserStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// A pending authorization, redeemable once at the token endpoint.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub scopes: Scopes,
    /// The redirect URI exactly as supplied at authorize time, if any.
    pub redirect_uri: Option<String>,
    pub response_type: ResponseType,
    /// S256 challenge.
    pub code_challenge: Option<String>,
    pub nonce: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An issued access token and its optional refresh token.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: Uuid,
    pub client_id: String,
    /// `None` for client-credentials tokens.
    pub user_id: Option<Uuid>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scopes: Scopes,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// `None` means the refresh token never expires.
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at.is_some_and(|at| now >= at)
    }

    /// Seconds until the access token expires, clamped at zero.
    pub fn expires_in(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}
