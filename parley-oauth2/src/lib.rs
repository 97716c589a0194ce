//! Embedded OAuth 2.0 / OpenID Connect authorization server for Parley.
//!
//! Issues opaque access and refresh tokens persisted through a pluggable
//! [`Store`], and RS256 ID tokens once a signing key pair is loaded into
//! the [`KeyManager`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use parley_oauth2::{InMemoryStore, KeyManager, OAuth2Config, OAuth2Server};
//!
//! let config = OAuth2Config::default();
//! let keys = Arc::new(KeyManager::new(&config.issuer));
//! keys.load_keys(&private_pem, &public_pem)?;
//!
//! let router = OAuth2Server::new(Arc::new(InMemoryStore::new()))
//!     .with_config(config)
//!     .with_key_manager(keys)
//!     .router();
//! ```

pub mod authorize;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod grant;
pub mod keys;
pub mod model;
pub mod pkce;
pub mod response_type;
pub mod scope;
pub mod store;
pub mod token;

mod handlers;
mod revoke;
mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use authorize::{AuthorizationRequest, AuthorizationRequestValidator, AuthorizeError};
pub use client::{hash_secret, Client, ClientCredentials};
pub use config::OAuth2Config;
pub use discovery::{DiscoveryDocument, DiscoveryPublisher};
pub use error::{KeyError, OAuth2Error};
pub use grant::{GrantProcessor, TokenRequest};
pub use keys::{Jwk, JwkSet, KeyManager};
pub use model::{AuthorizationCode, ResourceOwner, Token, User, UserStatus};
pub use response_type::ResponseType;
pub use scope::{Scope, Scopes};
pub use store::{InMemoryStore, Store, StoreError, StoreFuture};
pub use token::{IdTokenClaims, TokenResponse};

/// Builder for the authorization server router.
pub struct OAuth2Server {
    config: OAuth2Config,
    store: Arc<dyn Store>,
    keys: Option<Arc<KeyManager>>,
}

impl OAuth2Server {
    /// Create a server over the given store with default configuration.
    ///
    /// Defaults: issuer = `http://localhost:3000`, no base path, no key pair.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            config: OAuth2Config::default(),
            store,
            keys: None,
        }
    }

    pub fn with_config(mut self, config: OAuth2Config) -> Self {
        self.config = config;
        self
    }

    /// Set the issuer (`iss` claim and discovery base URL).
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = issuer.into();
        self
    }

    /// Set the base path for the `/oauth2/*` endpoints.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.config.base_path = path.into();
        self
    }

    /// Share a key manager with the rest of the application.
    ///
    /// Without one, the server starts with an empty manager and OIDC stays
    /// unavailable.
    pub fn with_key_manager(mut self, keys: Arc<KeyManager>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Build the Axum router.
    pub fn router(self) -> Router {
        let keys = self
            .keys
            .unwrap_or_else(|| Arc::new(KeyManager::new(self.config.issuer.clone())));
        let base_path = self.config.base_path.clone();

        let state = Arc::new(state::OAuth2State {
            validator: AuthorizationRequestValidator::new(
                self.store.clone(),
                keys.clone(),
                self.config.clone(),
            ),
            grants: GrantProcessor::new(self.store.clone(), keys.clone(), self.config.clone()),
            discovery: DiscoveryPublisher::new(keys, self.config),
            store: self.store,
        });

        let oauth2 = Router::new()
            .route(
                "/oauth2/authorize",
                get(handlers::authorize_get).post(handlers::authorize_post),
            )
            .route(
                "/oauth2/token",
                post(handlers::token_handler).fallback(handlers::token_method_not_allowed),
            )
            .route(
                "/oauth2/revoke",
                post(handlers::revoke_handler).fallback(handlers::token_method_not_allowed),
            )
            .route("/oauth2/jwks", get(handlers::jwks_handler))
            .with_state(state.clone());

        let well_known = Router::new()
            .route(
                "/.well-known/openid-configuration",
                get(handlers::discovery_handler),
            )
            .with_state(state);

        let oauth2 = if base_path.is_empty() {
            oauth2
        } else {
            Router::new().nest(&base_path, oauth2)
        };
        oauth2.merge(well_known)
    }
}
