use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{Extensions, HeaderMap};
use chrono::Utc;
use parley_oauth2::{ResourceOwner, Store, StoreError, User};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SecurityError;
use crate::identity::AuthenticatedUser;

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-sensitively and the token must be non-empty.
pub fn extract_bearer_token(header_value: &str) -> Result<&str, SecurityError> {
    match header_value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(SecurityError::InvalidAuthScheme),
    }
}

/// Resolves the caller of a resource request.
///
/// Bearer tokens are opaque and looked up in the [`Store`] on every request.
/// Without an `Authorization` header the verifier falls back to the
/// [`ResourceOwner`] the session layer put in the request extensions.
#[derive(Clone)]
pub struct TokenVerifier {
    store: Arc<dyn Store>,
}

impl TokenVerifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn verify(
        &self,
        headers: &HeaderMap,
        extensions: &Extensions,
    ) -> Result<AuthenticatedUser, SecurityError> {
        match headers.get(AUTHORIZATION) {
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| SecurityError::InvalidAuthScheme)?;
                let token = extract_bearer_token(value)?;
                self.verify_bearer(token).await
            }
            None => match extensions.get::<ResourceOwner>() {
                Some(ResourceOwner(user_id)) => self.verify_session(*user_id).await,
                None => Err(SecurityError::NotLoggedIn),
            },
        }
    }

    /// Resolve an access token. Unknown and expired tokens fail the same way.
    pub async fn verify_bearer(&self, token: &str) -> Result<AuthenticatedUser, SecurityError> {
        let token = match self.store.get_token_by_access(token).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => return Err(SecurityError::InvalidToken),
            Err(e) => return Err(e.into()),
        };
        if token.is_expired(Utc::now()) {
            debug!(token_id = %token.id, "Rejected expired access token");
            return Err(SecurityError::InvalidToken);
        }
        // Client-credentials tokens act for no user.
        let user_id = token.user_id.ok_or(SecurityError::InvalidToken)?;
        let user = self.active_user(user_id, SecurityError::InvalidToken).await?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            name: user.name,
            client_id: Some(token.client_id),
            scopes: Some(token.scopes),
        })
    }

    async fn verify_session(&self, user_id: Uuid) -> Result<AuthenticatedUser, SecurityError> {
        let user = self.active_user(user_id, SecurityError::NotLoggedIn).await?;
        Ok(AuthenticatedUser {
            user_id: user.id,
            name: user.name,
            client_id: None,
            scopes: None,
        })
    }

    async fn active_user(
        &self,
        user_id: Uuid,
        missing: SecurityError,
    ) -> Result<User, SecurityError> {
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(missing),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active() {
            warn!(user_id = %user_id, "Request from an inactive account");
            return Err(SecurityError::Suspended);
        }
        Ok(user)
    }
}
