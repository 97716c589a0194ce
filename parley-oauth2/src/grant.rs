use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{verify_secret_or_dummy, Client, ClientCredentials};
use crate::config::OAuth2Config;
use crate::error::OAuth2Error;
use crate::keys::KeyManager;
use crate::model::{Token, User};
use crate::pkce;
use crate::scope::Scopes;
use crate::store::{Store, StoreError};
use crate::token::{TokenResponse, TokenService};

/// Token request parameters (form-urlencoded).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// The token endpoint state machine.
pub struct GrantProcessor {
    store: Arc<dyn Store>,
    tokens: TokenService,
    config: OAuth2Config,
}

impl GrantProcessor {
    pub fn new(store: Arc<dyn Store>, keys: Arc<KeyManager>, config: OAuth2Config) -> Self {
        Self {
            tokens: TokenService::new(keys, config.clone()),
            store,
            config,
        }
    }

    /// Dispatch on `grant_type`.
    ///
    /// `credentials` are the client credentials already extracted from the
    /// Authorization header or the body.
    pub async fn process(
        &self,
        req: TokenRequest,
        credentials: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuth2Error> {
        match req.grant_type.as_deref() {
            Some("authorization_code") => self.authorization_code(req, credentials).await,
            Some("refresh_token") if self.config.refresh_enabled => {
                self.refresh_token(req, credentials).await
            }
            Some("password") if self.config.password_enabled => {
                self.password(req, credentials).await
            }
            Some("client_credentials") => self.client_credentials(req, credentials).await,
            Some(other) => Err(OAuth2Error::UnsupportedGrantType(format!(
                "grant_type '{other}' is not supported"
            ))),
            None => Err(OAuth2Error::UnsupportedGrantType(
                "missing 'grant_type' parameter".into(),
            )),
        }
    }

    /// Resolve and authenticate the calling client.
    pub async fn authenticate_client(
        &self,
        credentials: Option<ClientCredentials>,
    ) -> Result<Client, OAuth2Error> {
        let credentials = credentials
            .ok_or_else(|| OAuth2Error::InvalidClient("client authentication required".into()))?;

        let client = match self.store.get_client(&credentials.client_id).await {
            Ok(client) => client,
            Err(StoreError::NotFound) => {
                warn!(client_id = %credentials.client_id, "Unknown client");
                return Err(OAuth2Error::InvalidClient("invalid client credentials".into()));
            }
            Err(e) => return Err(e.into()),
        };

        if client.revoked || !client.authenticate(credentials.client_secret.as_deref()).await {
            warn!(client_id = %client.id, "Invalid client credentials");
            return Err(OAuth2Error::InvalidClient("invalid client credentials".into()));
        }
        Ok(client)
    }

    async fn authorization_code(
        &self,
        req: TokenRequest,
        credentials: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = required(req.code.as_deref(), "code")?;
        let client = self.authenticate_client(credentials).await?;

        // The code is gone after this line whatever happens next.
        let code = match self.store.consume_authorization_code(code).await {
            Ok(code) => code,
            Err(StoreError::NotFound) => {
                warn!(client_id = %client.id, "Unknown or already redeemed authorization code");
                return Err(OAuth2Error::InvalidGrant("invalid authorization code".into()));
            }
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        if code.client_id != client.id {
            warn!(client_id = %client.id, "Authorization code issued to another client");
            return Err(OAuth2Error::InvalidGrant("invalid authorization code".into()));
        }
        if code.is_expired(now) {
            return Err(OAuth2Error::InvalidGrant("authorization code expired".into()));
        }
        let redirect_matches = match (&code.redirect_uri, req.redirect_uri.as_deref()) {
            (Some(bound), Some(sent)) => bound == sent,
            (Some(_), None) => false,
            (None, Some(sent)) => client.redirect_uris.iter().any(|u| u == sent),
            (None, None) => true,
        };
        if !redirect_matches {
            return Err(OAuth2Error::InvalidGrant("redirect_uri mismatch".into()));
        }
        if let Some(challenge) = &code.code_challenge {
            let verifier = req.code_verifier.as_deref().unwrap_or_default();
            if !pkce::verify(verifier, challenge) {
                return Err(OAuth2Error::InvalidGrant("PKCE verification failed".into()));
            }
        }

        let user = self.active_user(code.user_id).await?;
        let id_token = if self.tokens.wants_id_token(&code.scopes) {
            Some(self.tokens.id_token(
                &client.id,
                &user,
                &code.scopes,
                code.nonce.as_deref(),
                code.issued_at,
                now,
            )?)
        } else {
            None
        };

        let token = self
            .tokens
            .mint(&client.id, Some(user.id), code.scopes, true, now);
        self.issue(token, id_token, now, "authorization_code").await
    }

    async fn refresh_token(
        &self,
        req: TokenRequest,
        credentials: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let value = required(req.refresh_token.as_deref(), "refresh_token")?;

        let old = match self.store.get_token_by_refresh(value).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => {
                return Err(OAuth2Error::InvalidGrant("invalid refresh token".into()))
            }
            Err(e) => return Err(e.into()),
        };
        let client = self.authenticate_client(credentials).await?;
        if old.client_id != client.id {
            warn!(client_id = %client.id, "Refresh token issued to another client");
            return Err(OAuth2Error::InvalidGrant("invalid refresh token".into()));
        }

        let scopes = match req.scope.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => {
                let requested = Scopes::parse(raw)?;
                if !requested.is_subset(&old.scopes) {
                    return Err(OAuth2Error::InvalidScope(
                        "requested scope exceeds the original grant".into(),
                    ));
                }
                requested
            }
            None => old.scopes.clone(),
        };

        // Losing this race means another request already rotated the token.
        let old = match self.store.consume_refresh_token(value).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => {
                warn!(client_id = %client.id, "Refresh token reused");
                return Err(OAuth2Error::InvalidGrant("invalid refresh token".into()));
            }
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        if old.is_refresh_expired(now) {
            return Err(OAuth2Error::InvalidGrant("refresh token expired".into()));
        }

        let (user, id_token) = match old.user_id {
            Some(user_id) => {
                let user = self.active_user(user_id).await?;
                let id_token = if self.tokens.wants_id_token(&scopes) {
                    Some(self.tokens.id_token(
                        &client.id, &user, &scopes, None, old.issued_at, now,
                    )?)
                } else {
                    None
                };
                (Some(user), id_token)
            }
            None => (None, None),
        };

        let token = self
            .tokens
            .mint(&client.id, user.map(|u| u.id), scopes, true, now);
        self.issue(token, id_token, now, "refresh_token").await
    }

    async fn password(
        &self,
        req: TokenRequest,
        credentials: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let username = required(req.username.as_deref(), "username")?;
        let password = required(req.password.as_deref(), "password")?;
        let client = self.authenticate_client(credentials).await?;
        warn!(client_id = %client.id, "Legacy password grant in use");

        let scopes = self.requested_scopes(req.scope.as_deref(), &client)?;

        let user = match self.store.get_user_by_name(username).await {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let hash = user.as_ref().and_then(|u| u.password_hash.as_deref());
        let valid = verify_secret_or_dummy(hash, password).await;
        let user = match user {
            Some(user) if valid => user,
            _ => {
                warn!(%username, "Invalid credentials");
                return Err(OAuth2Error::InvalidGrant("invalid username or password".into()));
            }
        };
        if !user.is_active() {
            return Err(OAuth2Error::InvalidGrant("the user account is not active".into()));
        }

        let now = Utc::now();
        let id_token = if self.tokens.wants_id_token(&scopes) {
            Some(self.tokens.id_token(&client.id, &user, &scopes, None, now, now)?)
        } else {
            None
        };
        let token = self.tokens.mint(&client.id, Some(user.id), scopes, true, now);
        self.issue(token, id_token, now, "password").await
    }

    async fn client_credentials(
        &self,
        req: TokenRequest,
        credentials: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let client = self.authenticate_client(credentials).await?;
        if !client.confidential {
            return Err(OAuth2Error::UnauthorizedClient(
                "client_credentials requires a confidential client".into(),
            ));
        }
        let scopes = self.requested_scopes(req.scope.as_deref(), &client)?;

        let now = Utc::now();
        let token = self.tokens.mint(&client.id, None, scopes, false, now);
        self.issue(token, None, now, "client_credentials").await
    }

    /// Requested scope, or the client's full allowance when omitted.
    fn requested_scopes(&self, raw: Option<&str>, client: &Client) -> Result<Scopes, OAuth2Error> {
        match raw.filter(|s| !s.is_empty()) {
            Some(raw) => {
                let requested = Scopes::parse(raw)?;
                if !requested.is_subset(&client.scopes) {
                    return Err(OAuth2Error::InvalidScope(
                        "requested scope exceeds the client's allowed scope".into(),
                    ));
                }
                Ok(requested)
            }
            None => Ok(client.scopes.clone()),
        }
    }

    async fn active_user(&self, id: uuid::Uuid) -> Result<User, OAuth2Error> {
        match self.store.get_user(id).await {
            Ok(user) if user.is_active() => Ok(user),
            Ok(_) => Err(OAuth2Error::InvalidGrant("the user account is not active".into())),
            Err(StoreError::NotFound) => Err(OAuth2Error::InvalidGrant("unknown user".into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn issue(
        &self,
        token: Token,
        id_token: Option<String>,
        now: DateTime<Utc>,
        grant_type: &'static str,
    ) -> Result<TokenResponse, OAuth2Error> {
        let response = TokenResponse::new(&token, now, id_token);
        let client_id = token.client_id.clone();
        self.store.save_token(token).await?;
        debug!(%client_id, grant_type, "Token issued");
        Ok(response)
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, OAuth2Error> {
    value
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::InvalidRequest(format!("missing '{name}' parameter")))
}
