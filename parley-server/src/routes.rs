use axum::extract::State;
use axum::Json;
use parley_core::HttpError;
use parley_oauth2::{Scope, User, UserStatus};
use parley_security::AuthenticatedUser;
use serde_json::{json, Value};

use crate::state::AppState;

async fn load_user(state: &AppState, caller: &AuthenticatedUser) -> Result<User, HttpError> {
    state
        .store
        .get_user(caller.user_id)
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))
}

/// OpenID Connect UserInfo. Bearer callers need the `openid` scope.
pub async fn userinfo(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<Value>, HttpError> {
    if !caller.allows(Scope::OpenId) {
        return Err(HttpError::Forbidden("insufficient scope".into()));
    }
    let user = load_user(&state, &caller).await?;

    let mut claims = json!({ "sub": user.id.to_string() });
    if caller.allows(Scope::Profile) {
        claims["name"] = json!(user.display_name);
        claims["preferred_username"] = json!(user.name);
    }
    Ok(Json(claims))
}

pub async fn me(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<Value>, HttpError> {
    let user = load_user(&state, &caller).await?;
    Ok(Json(json!({
        "id": user.id.to_string(),
        "name": user.name,
        "display_name": user.display_name,
        "status": status_name(user.status),
        "client_id": caller.client_id,
        "scope": caller.scopes.map(|s| s.to_string()),
    })))
}

fn status_name(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Active => "active",
        UserStatus::Suspended => "suspended",
        UserStatus::Deactivated => "deactivated",
    }
}
