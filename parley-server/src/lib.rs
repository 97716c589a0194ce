//! Wiring for the Parley server binary: the authorization server router,
//! the resource endpoints guarded by [`TokenVerifier`](parley_security::TokenVerifier),
//! and the tower layers around them.

pub mod routes;
pub mod seed;
mod state;

use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use parley_core::{catch_panic_layer, default_cors, default_trace, ParleyConfig};
use parley_oauth2::{KeyManager, OAuth2Config, OAuth2Server, Store};
use tracing::{info, warn};

pub use state::AppState;

/// Build the full application router.
pub fn app(config: OAuth2Config, store: Arc<dyn Store>, keys: Arc<KeyManager>) -> Router {
    let state = AppState::new(store.clone());
    let api = Router::new()
        .route(
            &format!("{}/oauth2/userinfo", config.base_path),
            get(routes::userinfo),
        )
        .route("/api/v3/users/me", get(routes::me))
        .with_state(state);

    OAuth2Server::new(store)
        .with_config(config)
        .with_key_manager(keys)
        .router()
        .merge(api)
        .layer(default_cors())
        .layer(default_trace())
        .layer(catch_panic_layer())
}

/// Load the signing pair named by `oauth2.keys.private` / `oauth2.keys.public`.
///
/// Missing or unusable keys leave OIDC unavailable; plain OAuth 2.0 keeps
/// working.
pub async fn load_keys(config: &ParleyConfig, keys: &KeyManager) {
    let (Ok(private), Ok(public)) = (
        config.get::<String>("oauth2.keys.private"),
        config.get::<String>("oauth2.keys.public"),
    ) else {
        warn!("No signing keys configured, OpenID Connect is disabled");
        return;
    };

    let (private_pem, public_pem) = match (read_pem(&private).await, read_pem(&public).await) {
        (Ok(private), Ok(public)) => (private, public),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Could not read signing keys, OpenID Connect is disabled");
            return;
        }
    };

    match keys.load_keys(&private_pem, &public_pem) {
        Ok(()) => info!(kid = ?keys.kid(), "Signing keys loaded"),
        Err(e) => warn!(error = %e, "Invalid signing keys, OpenID Connect is disabled"),
    }
}

/// Config values are either inline PEM (via `${file:...}`) or a path to one.
async fn read_pem(value: &str) -> std::io::Result<String> {
    if value.trim_start().starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }
    tokio::fs::read_to_string(Path::new(value)).await
}
