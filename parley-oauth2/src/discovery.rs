use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::OAuth2Config;
use crate::keys::{JwkSet, KeyManager};
use crate::response_type::ResponseType;
use crate::scope::Scope;

/// OpenID Connect discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub revocation_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

/// Publishes discovery metadata and the JWKS, only while a key pair is loaded.
pub struct DiscoveryPublisher {
    keys: Arc<KeyManager>,
    config: OAuth2Config,
}

impl DiscoveryPublisher {
    pub fn new(keys: Arc<KeyManager>, config: OAuth2Config) -> Self {
        Self { keys, config }
    }

    pub fn document(&self) -> Option<DiscoveryDocument> {
        if !self.keys.is_openid_connect_available() {
            return None;
        }
        let mut grant_types = vec!["authorization_code", "implicit"];
        if self.config.refresh_enabled {
            grant_types.push("refresh_token");
        }
        if self.config.password_enabled {
            grant_types.push("password");
        }
        grant_types.push("client_credentials");

        Some(DiscoveryDocument {
            issuer: self.config.issuer.clone(),
            authorization_endpoint: self.config.endpoint("/oauth2/authorize"),
            token_endpoint: self.config.endpoint("/oauth2/token"),
            userinfo_endpoint: self.config.endpoint("/oauth2/userinfo"),
            jwks_uri: self.config.endpoint("/oauth2/jwks"),
            revocation_endpoint: self.config.endpoint("/oauth2/revoke"),
            response_types_supported: strings(&ResponseType::SUPPORTED),
            response_modes_supported: strings(&["query", "fragment"]),
            grant_types_supported: strings(&grant_types),
            subject_types_supported: strings(&["public"]),
            id_token_signing_alg_values_supported: strings(&["RS256"]),
            scopes_supported: Scope::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            token_endpoint_auth_methods_supported: strings(&[
                "client_secret_basic",
                "client_secret_post",
                "none",
            ]),
            code_challenge_methods_supported: strings(&["S256"]),
            claims_supported: strings(&[
                "iss",
                "sub",
                "aud",
                "exp",
                "iat",
                "auth_time",
                "nonce",
                "name",
                "preferred_username",
            ]),
        })
    }

    pub fn jwks(&self) -> Option<JwkSet> {
        self.keys.public_jwk_set()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
