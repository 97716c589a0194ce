use std::sync::{Arc, PoisonError, RwLock};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::KeyError;

/// One verified RSA key pair, immutable once built.
struct SigningKeys {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Base64url-encoded RSA modulus (for JWKS).
    n: String,
    /// Base64url-encoded RSA public exponent (for JWKS).
    e: String,
}

impl SigningKeys {
    fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, KeyError> {
        let private_key = parse_private_key(private_pem)?;
        let public_key = parse_public_key(public_pem)?;

        private_key
            .validate()
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("private key: {e}")))?;
        if RsaPublicKey::from(&private_key) != public_key {
            return Err(KeyError::InvalidKeyMaterial(
                "private and public keys do not form a pair".into(),
            ));
        }

        // jsonwebtoken takes the private half as PEM; normalise to PKCS#8.
        let pkcs8_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("private key export: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(pkcs8_pem.as_bytes())
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("encoding key: {e}")))?;

        let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("decoding key: {e}")))?;

        Ok(Self {
            kid: thumbprint(&n, &e),
            encoding_key,
            decoding_key,
            n,
            e,
        })
    }
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|_| KeyError::InvalidKeyMaterial("not a PEM-encoded RSA private key".into()))
}

fn parse_public_key(pem: &str) -> Result<RsaPublicKey, KeyError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|_| KeyError::InvalidKeyMaterial("not a PEM-encoded RSA public key".into()))
}

/// RFC 7638 JWK thumbprint. Members in lexicographic order, no whitespace.
fn thumbprint(n: &str, e: &str) -> String {
    let canonical = format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

/// Holder of the active signing key pair.
///
/// Starts empty; [`load_keys`](Self::load_keys) installs a verified pair by
/// swapping a single `Arc`. Signers and verifiers clone the `Arc` and never
/// hold the lock while doing crypto, so a reload cannot tear a read.
pub struct KeyManager {
    issuer: String,
    active: RwLock<Option<Arc<SigningKeys>>>,
}

impl KeyManager {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            active: RwLock::new(None),
        }
    }

    /// `iss` claim of every token this manager signs.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Parse, cross-check and install a key pair.
    ///
    /// On any failure the previously loaded pair, if any, stays active.
    pub fn load_keys(&self, private_pem: &str, public_pem: &str) -> Result<(), KeyError> {
        let keys = Arc::new(SigningKeys::from_pem(private_pem, public_pem)?);
        let kid = keys.kid.clone();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(keys);
        tracing::info!(%kid, "Signing key pair loaded");
        Ok(())
    }

    pub fn is_openid_connect_available(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Key id of the active pair.
    pub fn kid(&self) -> Option<String> {
        self.snapshot().map(|k| k.kid.clone())
    }

    /// Sign claims as a compact RS256 JWT carrying the active `kid`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, KeyError> {
        let keys = self.snapshot().ok_or(KeyError::Unavailable)?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(keys.kid.clone());
        jsonwebtoken::encode(&header, claims, &keys.encoding_key)
            .map_err(|e| KeyError::Signing(e.to_string()))
    }

    /// Decode a token signed by the active pair, checking `iss`, `aud` and `exp`.
    pub fn verify<T: DeserializeOwned>(&self, token: &str, audience: &str) -> Result<T, KeyError> {
        let keys = self.snapshot().ok_or(KeyError::Unavailable)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[audience]);
        jsonwebtoken::decode::<T>(token, &keys.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| KeyError::InvalidToken(e.to_string()))
    }

    /// The public half as a JWK Set, or `None` before any key is loaded.
    pub fn public_jwk_set(&self) -> Option<JwkSet> {
        self.snapshot().map(|keys| JwkSet {
            keys: vec![Jwk {
                kty: "RSA".into(),
                alg: "RS256".into(),
                key_use: "sig".into(),
                kid: keys.kid.clone(),
                n: keys.n.clone(),
                e: keys.e.clone(),
            }],
        })
    }

    fn snapshot(&self) -> Option<Arc<SigningKeys>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// JWKS response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A single RSA public key in JWK form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}
