use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::OAuth2Error;
use crate::scope::Scopes;

/// A pre-provisioned OAuth 2.0 client.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub confidential: bool,
    pub redirect_uris: Vec<String>,
    pub scopes: Scopes,
    /// Argon2 PHC string, confidential clients only.
    pub secret_hash: Option<String>,
    pub revoked: bool,
}

impl Client {
    /// A public client (no secret).
    pub fn public(id: impl Into<String>, name: impl Into<String>, scopes: Scopes) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            confidential: false,
            redirect_uris: Vec::new(),
            scopes,
            secret_hash: None,
            revoked: false,
        }
    }

    /// A confidential client whose secret is hashed with argon2.
    pub fn confidential(
        id: impl Into<String>,
        name: impl Into<String>,
        secret: &str,
        scopes: Scopes,
    ) -> Result<Self, password_hash::Error> {
        Ok(Self {
            confidential: true,
            secret_hash: Some(hash_secret(secret)?),
            ..Self::public(id, name, scopes)
        })
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Check a presented secret.
    ///
    /// Public clients authenticate by id alone, so any secret they send is
    /// ignored. Confidential clients need a matching secret; argon2 runs on a
    /// blocking thread.
    pub async fn authenticate(&self, secret: Option<&str>) -> bool {
        if !self.confidential {
            return true;
        }
        match (&self.secret_hash, secret) {
            (Some(hash), Some(secret)) => verify_secret(hash, secret).await,
            _ => false,
        }
    }
}

/// Hash a client secret or user password into an argon2 PHC string.
pub fn hash_secret(secret: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(secret.as_bytes(), &salt)?
        .to_string())
}

/// Verify a secret against an argon2 PHC string without blocking the runtime.
pub async fn verify_secret(hash: &str, secret: &str) -> bool {
    verify_secret_or_dummy(Some(hash), secret).await
}

/// Like [`verify_secret`], but with no stored hash the secret is checked
/// against a throwaway one and rejected. An unknown account then costs the
/// same argon2 work as a wrong password.
pub async fn verify_secret_or_dummy(hash: Option<&str>, secret: &str) -> bool {
    let hash = hash.map(str::to_string);
    let secret = secret.to_string();
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => argon2_matches(&hash, &secret),
        None => {
            if let Some(dummy) = dummy_hash() {
                argon2_matches(dummy, &secret);
            }
            false
        }
    })
    .await
    .unwrap_or(false)
}

fn argon2_matches(hash: &str, secret: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_secret("parley-unknown-account").ok())
        .as_deref()
}

/// Client credentials presented with a token or revoke request.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    /// Collect credentials from an HTTP Basic header (`client_secret_basic`)
    /// or the body (`client_secret_post`). Using both at once is an error.
    pub fn from_request(
        headers: &HeaderMap,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<Option<Self>, OAuth2Error> {
        let basic = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "));

        match basic {
            Some(encoded) => {
                if client_secret.is_some() {
                    return Err(OAuth2Error::InvalidRequest(
                        "client credentials sent with more than one method".into(),
                    ));
                }
                let creds = decode_basic(encoded)
                    .ok_or_else(|| OAuth2Error::InvalidClient("malformed Basic credentials".into()))?;
                if client_id.is_some_and(|id| id != creds.client_id) {
                    return Err(OAuth2Error::InvalidRequest(
                        "client_id does not match the Authorization header".into(),
                    ));
                }
                Ok(Some(creds))
            }
            None => Ok(client_id.map(|id| ClientCredentials {
                client_id: id.to_string(),
                client_secret: client_secret.map(str::to_string),
            })),
        }
    }
}

/// RFC 6749 §2.3.1: id and secret are form-urlencoded before base64.
fn decode_basic(encoded: &str) -> Option<ClientCredentials> {
    let raw = STANDARD.decode(encoded.trim()).ok()?;
    let raw = String::from_utf8(raw).ok()?;
    let (id, secret) = raw.split_once(':')?;
    let decode = |s: &str| -> String {
        form_urlencoded::parse(format!("v={s}").as_bytes())
            .next()
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    };
    let client_id = decode(id);
    if client_id.is_empty() {
        return None;
    }
    Some(ClientCredentials {
        client_id,
        client_secret: Some(decode(secret)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let dummy = dummy_hash().unwrap();
        assert!(PasswordHash::new(dummy).is_ok());
        assert!(argon2_matches(dummy, "parley-unknown-account"));
    }

    #[tokio::test]
    async fn missing_hash_never_verifies() {
        assert!(!verify_secret_or_dummy(None, "parley-unknown-account").await);
        assert!(!verify_secret_or_dummy(None, "").await);

        let hash = hash_secret("s3cret").unwrap();
        assert!(verify_secret_or_dummy(Some(&hash), "s3cret").await);
        assert!(!verify_secret_or_dummy(Some(&hash), "other").await);
    }

    fn basic(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(value);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn basic_credentials_are_urldecoded() {
        let creds = ClientCredentials::from_request(&basic("bot%3A1:s%2Bcret"), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(creds.client_id, "bot:1");
        assert_eq!(creds.client_secret.as_deref(), Some("s+cret"));
    }

    #[test]
    fn body_credentials() {
        let creds = ClientCredentials::from_request(&HeaderMap::new(), Some("web"), Some("pw"))
            .unwrap()
            .unwrap();
        assert_eq!(creds.client_id, "web");
        assert_eq!(creds.client_secret.as_deref(), Some("pw"));
    }

    #[test]
    fn both_methods_is_invalid_request() {
        let err = ClientCredentials::from_request(&basic("web:pw"), Some("web"), Some("pw"))
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[test]
    fn no_credentials() {
        assert!(ClientCredentials::from_request(&HeaderMap::new(), None, None)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn confidential_client_needs_secret() {
        let client = Client::confidential("bot", "Bot", "s3cret", Scopes::new()).unwrap();
        assert!(client.authenticate(Some("s3cret")).await);
        assert!(!client.authenticate(Some("wrong")).await);
        assert!(!client.authenticate(None).await);
    }

    #[tokio::test]
    async fn public_client_needs_nothing() {
        let client = Client::public("web", "Web", Scopes::new());
        assert!(client.authenticate(None).await);
    }
}
