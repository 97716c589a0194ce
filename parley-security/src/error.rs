use axum::response::{IntoResponse, Response};
use parley_core::HttpError;
use parley_oauth2::StoreError;

/// Failures on the resource-server path.
#[derive(Debug)]
pub enum SecurityError {
    /// An `Authorization` header is present but is not `Bearer <token>`.
    InvalidAuthScheme,

    /// The bearer token is unknown, expired, or not tied to a user.
    InvalidToken,

    /// Neither a bearer token nor a session identified the caller.
    NotLoggedIn,

    /// The caller's account is not active.
    Suspended,

    /// The store failed. The message is logged only.
    Internal(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::InvalidAuthScheme => write!(f, "invalid authorization scheme"),
            SecurityError::InvalidToken => write!(f, "invalid token"),
            SecurityError::NotLoggedIn => write!(f, "You are not logged in"),
            SecurityError::Suspended => write!(f, "this account is currently suspended"),
            SecurityError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<StoreError> for SecurityError {
    fn from(err: StoreError) -> Self {
        SecurityError::Internal(err.to_string())
    }
}

impl From<SecurityError> for HttpError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Suspended => HttpError::Forbidden(err.to_string()),
            SecurityError::Internal(msg) => HttpError::Internal(msg),
            SecurityError::InvalidAuthScheme
            | SecurityError::InvalidToken
            | SecurityError::NotLoggedIn => HttpError::Unauthorized(err.to_string()),
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        HttpError::from(self).into_response()
    }
}
