use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::client::Client;
use crate::config::OAuth2Config;
use crate::error::OAuth2Error;
use crate::keys::KeyManager;
use crate::model::{random_token_value, ttl, AuthorizationCode, ResourceOwner};
use crate::pkce;
use crate::response_type::ResponseType;
use crate::scope::{Scope, Scopes};
use crate::store::{Store, StoreError};
use crate::token::TokenService;

/// Parameters of an authorize request, from the query string or a form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub prompt: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// An authorize request that passed every check and only awaits the resource owner.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub client: Client,
    pub response_type: ResponseType,
    pub scopes: Scopes,
    /// Where the response goes.
    pub redirect_uri: Url,
    /// The `redirect_uri` parameter as sent, bound to the code.
    pub supplied_redirect_uri: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
}

/// Where an authorize failure is reported.
#[derive(Debug)]
pub enum AuthorizeError {
    /// The redirect target is not trusted; answer the user agent directly.
    Direct(OAuth2Error),
    /// Report the error to the client through its redirect URI.
    Redirect {
        error: OAuth2Error,
        redirect_uri: Url,
        state: Option<String>,
        fragment: bool,
    },
}

impl AuthorizeError {
    pub fn error(&self) -> &OAuth2Error {
        match self {
            AuthorizeError::Direct(error) | AuthorizeError::Redirect { error, .. } => error,
        }
    }
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        match self {
            AuthorizeError::Direct(error) => error.into_response(),
            AuthorizeError::Redirect {
                error,
                redirect_uri,
                state,
                fragment,
            } => {
                if let OAuth2Error::Internal(detail) = &error {
                    tracing::error!(error = %detail, "OAuth2 internal error during authorize");
                }
                let mut params = vec![
                    ("error", error.error_code().to_string()),
                    ("error_description", error.description().to_string()),
                ];
                if let Some(state) = state {
                    params.push(("state", state));
                }
                AuthorizationResponse {
                    redirect_uri,
                    params,
                    fragment,
                }
                .into_response()
            }
        }
    }
}

/// Successful authorize outcome: a redirect carrying code, tokens and state.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    redirect_uri: Url,
    params: Vec<(&'static str, String)>,
    fragment: bool,
}

impl AuthorizationResponse {
    /// The full redirect target.
    pub fn location(&self) -> Url {
        let mut url = self.redirect_uri.clone();
        if self.params.is_empty() {
            return url;
        }
        if self.fragment {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            url.set_fragment(Some(&encoded));
        } else {
            url.query_pairs_mut()
                .extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl IntoResponse for AuthorizationResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::FOUND,
            [
                (header::LOCATION, self.location().to_string()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
        )
            .into_response()
    }
}

/// Validates authorize requests and mints codes or implicit tokens.
pub struct AuthorizationRequestValidator {
    store: Arc<dyn Store>,
    keys: Arc<KeyManager>,
    tokens: TokenService,
    config: OAuth2Config,
}

impl AuthorizationRequestValidator {
    pub fn new(store: Arc<dyn Store>, keys: Arc<KeyManager>, config: OAuth2Config) -> Self {
        Self {
            tokens: TokenService::new(keys.clone(), config.clone()),
            store,
            keys,
            config,
        }
    }

    /// Validate the request, then grant it on behalf of `owner`.
    pub async fn authorize(
        &self,
        req: AuthorizationRequest,
        owner: Option<ResourceOwner>,
    ) -> Result<AuthorizationResponse, AuthorizeError> {
        let validated = self.validate(req).await?;
        self.approve(validated, owner).await
    }

    /// Check client, redirect URI, response type, scope and PKCE.
    ///
    /// Until the redirect URI is known to be registered, failures are
    /// [`AuthorizeError::Direct`]; afterwards they redirect.
    pub async fn validate(
        &self,
        req: AuthorizationRequest,
    ) -> Result<ValidatedRequest, AuthorizeError> {
        let client_id = non_empty(req.client_id.as_deref()).ok_or_else(|| {
            AuthorizeError::Direct(OAuth2Error::InvalidRequest(
                "missing 'client_id' parameter".into(),
            ))
        })?;

        let client = match self.store.get_client(client_id).await {
            Ok(client) => client,
            Err(StoreError::NotFound) => {
                warn!(client_id, "Authorize request for unknown client");
                return Err(AuthorizeError::Direct(OAuth2Error::InvalidRequest(
                    "unknown client".into(),
                )));
            }
            Err(e) => return Err(AuthorizeError::Direct(e.into())),
        };
        if client.revoked {
            return Err(AuthorizeError::Direct(OAuth2Error::UnauthorizedClient(
                "client is revoked".into(),
            )));
        }

        let supplied_redirect_uri = non_empty(req.redirect_uri.as_deref()).map(str::to_string);
        let redirect_uri = match (&supplied_redirect_uri, client.redirect_uris.as_slice()) {
            (Some(uri), registered) if registered.contains(uri) => uri.clone(),
            (Some(_), _) => {
                return Err(AuthorizeError::Direct(OAuth2Error::InvalidRequest(
                    "redirect_uri is not registered for this client".into(),
                )))
            }
            (None, [only]) => only.clone(),
            (None, _) => {
                return Err(AuthorizeError::Direct(OAuth2Error::InvalidRequest(
                    "missing 'redirect_uri' parameter".into(),
                )))
            }
        };
        let redirect_uri = Url::parse(&redirect_uri).map_err(|_| {
            AuthorizeError::Direct(OAuth2Error::InvalidRequest(
                "registered redirect_uri is not an absolute URL".into(),
            ))
        })?;

        // From here on the client learns about errors through its redirect URI.
        let state = req.state.clone();
        let redirect = |error: OAuth2Error, fragment: bool| AuthorizeError::Redirect {
            error,
            redirect_uri: redirect_uri.clone(),
            state: state.clone(),
            fragment,
        };

        let raw_type = non_empty(req.response_type.as_deref()).ok_or_else(|| {
            redirect(
                OAuth2Error::InvalidRequest("missing 'response_type' parameter".into()),
                false,
            )
        })?;
        let response_type = ResponseType::parse(raw_type).map_err(|e| redirect(e, false))?;
        let fragment = response_type.uses_fragment();

        let scopes = match non_empty(req.scope.as_deref()) {
            Some(raw) => Scopes::parse(raw).map_err(|e| redirect(e, fragment))?,
            None => client.scopes.clone(),
        };
        if !scopes.is_subset(&client.scopes) {
            return Err(redirect(
                OAuth2Error::InvalidScope("requested scope exceeds the client's allowed scope".into()),
                fragment,
            ));
        }

        if response_type.id_token {
            if !self.keys.is_openid_connect_available() {
                return Err(redirect(
                    OAuth2Error::UnsupportedResponseType("id_token is not available".into()),
                    fragment,
                ));
            }
            if !scopes.contains(Scope::OpenId) {
                return Err(redirect(
                    OAuth2Error::InvalidRequest("id_token requires the 'openid' scope".into()),
                    fragment,
                ));
            }
            if non_empty(req.nonce.as_deref()).is_none() {
                return Err(redirect(
                    OAuth2Error::InvalidRequest("id_token requires a 'nonce'".into()),
                    fragment,
                ));
            }
        }

        let code_challenge = pkce::validate_challenge(
            non_empty(req.code_challenge.as_deref()),
            non_empty(req.code_challenge_method.as_deref()),
        )
        .map_err(|e| redirect(e, fragment))?;

        Ok(ValidatedRequest {
            client,
            response_type,
            scopes,
            redirect_uri: redirect_uri.clone(),
            supplied_redirect_uri,
            state: req.state,
            nonce: non_empty(req.nonce.as_deref()).map(str::to_string),
            code_challenge,
        })
    }

    /// Grant a validated request for the authenticated resource owner.
    pub async fn approve(
        &self,
        req: ValidatedRequest,
        owner: Option<ResourceOwner>,
    ) -> Result<AuthorizationResponse, AuthorizeError> {
        let fragment = req.response_type.uses_fragment();
        let redirect = |error: OAuth2Error| AuthorizeError::Redirect {
            error,
            redirect_uri: req.redirect_uri.clone(),
            state: req.state.clone(),
            fragment,
        };

        let ResourceOwner(user_id) = owner.ok_or_else(|| {
            redirect(OAuth2Error::LoginRequired("the user is not logged in".into()))
        })?;
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(redirect(OAuth2Error::AccessDenied("unknown user".into())))
            }
            Err(e) => return Err(redirect(e.into())),
        };
        if !user.is_active() {
            return Err(redirect(OAuth2Error::AccessDenied(
                "the user account is not active".into(),
            )));
        }

        let now = Utc::now();
        let mut params = Vec::new();

        if req.response_type.code {
            let code = AuthorizationCode {
                code: random_token_value(),
                client_id: req.client.id.clone(),
                user_id,
                scopes: req.scopes.clone(),
                redirect_uri: req.supplied_redirect_uri.clone(),
                response_type: req.response_type,
                code_challenge: req.code_challenge.clone(),
                nonce: req.nonce.clone(),
                issued_at: now,
                expires_at: now + ttl(self.config.code_ttl_secs),
            };
            let value = code.code.clone();
            self.store
                .save_authorization_code(code)
                .await
                .map_err(|e| redirect(e.into()))?;
            params.push(("code", value));
        }

        if req.response_type.token {
            let token = self
                .tokens
                .mint(&req.client.id, Some(user_id), req.scopes.clone(), false, now);
            params.push(("access_token", token.access_token.clone()));
            params.push(("token_type", "Bearer".to_string()));
            params.push(("expires_in", token.expires_in(now).to_string()));
            params.push(("scope", token.scopes.to_string()));
            self.store
                .save_token(token)
                .await
                .map_err(|e| redirect(e.into()))?;
        }

        if req.response_type.id_token {
            let id_token = self
                .tokens
                .id_token(
                    &req.client.id,
                    &user,
                    &req.scopes,
                    req.nonce.as_deref(),
                    now,
                    now,
                )
                .map_err(|e| redirect(e.into()))?;
            params.push(("id_token", id_token));
        }

        if let Some(state) = &req.state {
            params.push(("state", state.clone()));
        }

        debug!(
            client_id = %req.client.id,
            user_id = %user_id,
            response_type = %req.response_type,
            "Authorization granted"
        );

        Ok(AuthorizationResponse {
            redirect_uri: req.redirect_uri,
            params,
            fragment,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
