use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::store::StoreError;

/// OAuth 2.0 error response per RFC 6749 Section 5.2.
#[derive(Debug, Serialize)]
pub struct OAuth2ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

/// Protocol-level error returned by the authorize, token and revoke endpoints.
#[derive(Debug)]
pub enum OAuth2Error {
    /// Missing, repeated or malformed parameter.
    InvalidRequest(String),
    /// Client authentication failed.
    InvalidClient(String),
    /// Bad, expired or consumed code or refresh token, or a binding mismatch.
    InvalidGrant(String),
    /// The client may not use this grant or response type.
    UnauthorizedClient(String),
    UnsupportedGrantType(String),
    UnsupportedResponseType(String),
    InvalidScope(String),
    /// The resource owner may not authorize this request.
    AccessDenied(String),
    /// No authenticated resource owner behind an authorize request.
    LoginRequired(String),
    /// Store or crypto failure. The detail is logged, never sent.
    Internal(String),
}

impl OAuth2Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuth2Error::InvalidRequest(_) => "invalid_request",
            OAuth2Error::InvalidClient(_) => "invalid_client",
            OAuth2Error::InvalidGrant(_) => "invalid_grant",
            OAuth2Error::UnauthorizedClient(_) => "unauthorized_client",
            OAuth2Error::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuth2Error::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuth2Error::InvalidScope(_) => "invalid_scope",
            OAuth2Error::AccessDenied(_) => "access_denied",
            OAuth2Error::LoginRequired(_) => "login_required",
            OAuth2Error::Internal(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OAuth2Error::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            OAuth2Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Description safe to hand to the caller.
    pub fn description(&self) -> &str {
        match self {
            OAuth2Error::Internal(_) => "internal server error",
            OAuth2Error::InvalidRequest(s)
            | OAuth2Error::InvalidClient(s)
            | OAuth2Error::InvalidGrant(s)
            | OAuth2Error::UnauthorizedClient(s)
            | OAuth2Error::UnsupportedGrantType(s)
            | OAuth2Error::UnsupportedResponseType(s)
            | OAuth2Error::InvalidScope(s)
            | OAuth2Error::AccessDenied(s)
            | OAuth2Error::LoginRequired(s) => s,
        }
    }
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        if let OAuth2Error::Internal(detail) = &self {
            tracing::error!(error = %detail, "OAuth2 internal error");
        }
        let body = OAuth2ErrorBody {
            error: self.error_code(),
            error_description: self.description().to_string(),
        };
        if let OAuth2Error::InvalidClient(_) = &self {
            return (
                self.status_code(),
                [(header::WWW_AUTHENTICATE, "Basic realm=\"oauth2\"")],
                Json(body),
            )
                .into_response();
        }
        (self.status_code(), Json(body)).into_response()
    }
}

impl std::fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuth2Error::Internal(detail) => write!(f, "server_error: {detail}"),
            other => write!(f, "{}: {}", other.error_code(), other.description()),
        }
    }
}

impl std::error::Error for OAuth2Error {}

/// Any store failure that reaches the boundary unhandled is internal.
/// Call sites that give `NotFound` a protocol meaning match on it first.
impl From<StoreError> for OAuth2Error {
    fn from(err: StoreError) -> Self {
        OAuth2Error::Internal(format!("store: {err}"))
    }
}

impl From<KeyError> for OAuth2Error {
    fn from(err: KeyError) -> Self {
        OAuth2Error::Internal(format!("keys: {err}"))
    }
}

/// Errors raised by the [`KeyManager`](crate::keys::KeyManager).
#[derive(Debug)]
pub enum KeyError {
    /// Unparseable PEM, wrong key type, or a private/public mismatch.
    InvalidKeyMaterial(String),
    /// No key pair is loaded.
    Unavailable,
    /// Signing a token failed.
    Signing(String),
    /// A presented token failed signature or claim validation.
    InvalidToken(String),
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyError::InvalidKeyMaterial(msg) => write!(f, "invalid key material: {msg}"),
            KeyError::Unavailable => write!(f, "no signing key pair loaded"),
            KeyError::Signing(msg) => write!(f, "signing failed: {msg}"),
            KeyError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
        }
    }
}

impl std::error::Error for KeyError {}
