use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use parley_core::HttpError;
use parley_oauth2::ResourceOwner;
use tracing::{debug, warn};

use crate::error::SecurityError;
use crate::identity::AuthenticatedUser;
use crate::verifier::TokenVerifier;

/// Resolve the caller of a request, reusing an identity already placed in
/// the extensions by [`require_user`].
pub async fn authenticate_parts(
    parts: &Parts,
    verifier: &TokenVerifier,
) -> Result<AuthenticatedUser, SecurityError> {
    if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
        return Ok(user.clone());
    }
    let user = verifier
        .verify(&parts.headers, &parts.extensions)
        .await
        .inspect_err(|e| log_rejection(&parts.uri, e))?;
    debug!(uri = %parts.uri, user_id = %user.user_id, "Authenticated request");
    Ok(user)
}

fn log_rejection(uri: &axum::http::Uri, err: &SecurityError) {
    match err {
        SecurityError::Internal(msg) => {
            tracing::error!(uri = %uri, error = %msg, "Token verification failed")
        }
        _ => warn!(uri = %uri, error = %err, "Request authentication rejected"),
    }
}

/// Extracts the caller from a bearer token or the session.
///
/// The application state must provide `Arc<TokenVerifier>` via `FromRef`.
///
/// ```ignore
/// async fn me(user: AuthenticatedUser) -> String {
///     format!("Hello, {}!", user.name)
/// }
/// ```
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<TokenVerifier>: FromRef<S>,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier: Arc<TokenVerifier> = Arc::from_ref(state);
        Ok(authenticate_parts(parts, &verifier).await?)
    }
}

/// `Option<AuthenticatedUser>` for endpoints that also serve anonymous callers.
///
/// - No `Authorization` header and no session → `Ok(None)`
/// - A header that fails verification → `Err`
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<TokenVerifier>: FromRef<S>,
{
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION)
            && parts.extensions.get::<ResourceOwner>().is_none()
            && parts.extensions.get::<AuthenticatedUser>().is_none()
        {
            return Ok(None);
        }
        let verifier: Arc<TokenVerifier> = Arc::from_ref(state);
        Ok(Some(authenticate_parts(parts, &verifier).await?))
    }
}

/// Middleware rejecting unauthenticated requests and inserting the
/// [`AuthenticatedUser`] into the request extensions.
///
/// ```ignore
/// let api = Router::new()
///     .route("/users/me", get(me))
///     .layer(axum::middleware::from_fn_with_state(verifier, require_user));
/// ```
pub async fn require_user(
    State(verifier): State<Arc<TokenVerifier>>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let (mut parts, body) = req.into_parts();
    let user = authenticate_parts(&parts, &verifier).await?;
    parts.extensions.insert(user);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
