use std::sync::Arc;

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form, Json};
use parley_core::HttpError;
use tracing::debug;

use crate::authorize::{AuthorizationRequest, AuthorizeError};
use crate::client::ClientCredentials;
use crate::error::{OAuth2Error, OAuth2ErrorBody};
use crate::grant::TokenRequest;
use crate::model::ResourceOwner;
use crate::revoke::{self, RevocationRequest};
use crate::token::TokenResponse;
use crate::state::OAuth2State;

/// RFC 6749 §5.1 required headers for token responses.
type TokenResponseHeaders = [(header::HeaderName, &'static str); 2];
const TOKEN_HEADERS: TokenResponseHeaders = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

/// Any method other than POST on the token or revoke endpoint.
pub(crate) async fn token_method_not_allowed() -> Response {
    let body = OAuth2ErrorBody {
        error: "invalid_request",
        error_description: "method not allowed".to_string(),
    };
    (
        StatusCode::METHOD_NOT_ALLOWED,
        TOKEN_HEADERS,
        [(header::ALLOW, "POST")],
        Json(body),
    )
        .into_response()
}

/// GET {path}/oauth2/authorize
pub(crate) async fn authorize_get(
    State(state): State<Arc<OAuth2State>>,
    owner: Option<Extension<ResourceOwner>>,
    query: Result<Query<AuthorizationRequest>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(req)) => authorize(&state, req, owner).await,
        Err(rejection) => AuthorizeError::Direct(OAuth2Error::InvalidRequest(
            rejection.body_text(),
        ))
        .into_response(),
    }
}

/// POST {path}/oauth2/authorize
pub(crate) async fn authorize_post(
    State(state): State<Arc<OAuth2State>>,
    owner: Option<Extension<ResourceOwner>>,
    form: Result<Form<AuthorizationRequest>, FormRejection>,
) -> Response {
    match form {
        Ok(Form(req)) => authorize(&state, req, owner).await,
        Err(rejection) => AuthorizeError::Direct(OAuth2Error::InvalidRequest(
            rejection.body_text(),
        ))
        .into_response(),
    }
}

async fn authorize(
    state: &OAuth2State,
    req: AuthorizationRequest,
    owner: Option<Extension<ResourceOwner>>,
) -> Response {
    let owner = owner.map(|Extension(owner)| owner);
    match state.validator.authorize(req, owner).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            debug!(error = %e.error(), "Authorize request rejected");
            e.into_response()
        }
    }
}

/// POST {path}/oauth2/token
pub(crate) async fn token_handler(
    State(state): State<Arc<OAuth2State>>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    // Success or failure, token responses must not be cached.
    (TOKEN_HEADERS, token_request(&state, &headers, form).await).into_response()
}

async fn token_request(
    state: &OAuth2State,
    headers: &HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Json<TokenResponse>, OAuth2Error> {
    let Form(req) = form.map_err(|e| OAuth2Error::InvalidRequest(e.body_text()))?;
    let credentials = ClientCredentials::from_request(
        headers,
        req.client_id.as_deref(),
        req.client_secret.as_deref(),
    )?;
    state.grants.process(req, credentials).await.map(Json)
}

/// POST {path}/oauth2/revoke
pub(crate) async fn revoke_handler(
    State(state): State<Arc<OAuth2State>>,
    headers: HeaderMap,
    form: Result<Form<RevocationRequest>, FormRejection>,
) -> Response {
    (TOKEN_HEADERS, revoke_request(&state, &headers, form).await).into_response()
}

async fn revoke_request(
    state: &OAuth2State,
    headers: &HeaderMap,
    form: Result<Form<RevocationRequest>, FormRejection>,
) -> Result<(), OAuth2Error> {
    let Form(req) = form.map_err(|e| OAuth2Error::InvalidRequest(e.body_text()))?;
    let credentials = ClientCredentials::from_request(
        headers,
        req.client_id.as_deref(),
        req.client_secret.as_deref(),
    )?;
    revoke::revoke(&state.store, &state.grants, req, credentials).await
}

/// GET /.well-known/openid-configuration
pub(crate) async fn discovery_handler(
    State(state): State<Arc<OAuth2State>>,
) -> Result<impl IntoResponse, HttpError> {
    state
        .discovery
        .document()
        .map(Json)
        .ok_or_else(oidc_unavailable)
}

/// GET {path}/oauth2/jwks
pub(crate) async fn jwks_handler(
    State(state): State<Arc<OAuth2State>>,
) -> Result<impl IntoResponse, HttpError> {
    state.discovery.jwks().map(Json).ok_or_else(oidc_unavailable)
}

fn oidc_unavailable() -> HttpError {
    HttpError::NotFound("OpenID Connect is not available".into())
}
