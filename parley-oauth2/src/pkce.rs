//! Proof Key for Code Exchange (RFC 7636), `S256` only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::OAuth2Error;

/// Length of a base64url-encoded SHA-256 digest.
const CHALLENGE_LEN: usize = 43;

/// Check a `code_challenge` / `code_challenge_method` pair from an authorize request.
///
/// Returns the challenge to store, or `None` when the client sent neither.
pub fn validate_challenge(
    challenge: Option<&str>,
    method: Option<&str>,
) -> Result<Option<String>, OAuth2Error> {
    let challenge = match (challenge, method) {
        (None, None) => return Ok(None),
        (None, Some(_)) => {
            return Err(OAuth2Error::InvalidRequest(
                "code_challenge_method without code_challenge".into(),
            ))
        }
        (Some(_), None) => {
            return Err(OAuth2Error::InvalidRequest(
                "code_challenge_method is required".into(),
            ))
        }
        (Some(challenge), Some("S256")) => challenge,
        (Some(_), Some(other)) => {
            return Err(OAuth2Error::InvalidRequest(format!(
                "unsupported code_challenge_method '{other}'"
            )))
        }
    };

    let well_formed = challenge.len() == CHALLENGE_LEN
        && challenge
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !well_formed {
        return Err(OAuth2Error::InvalidRequest("malformed code_challenge".into()));
    }
    Ok(Some(challenge.to_string()))
}

/// Verify a `code_verifier` against the stored S256 challenge.
pub fn verify(verifier: &str, challenge: &str) -> bool {
    let len = verifier.len();
    if !(43..=128).contains(&len) {
        return false;
    }
    if !verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    {
        return false;
    }
    let computed = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}
