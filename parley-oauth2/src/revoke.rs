use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::client::ClientCredentials;
use crate::error::OAuth2Error;
use crate::grant::GrantProcessor;
use crate::model::Token;
use crate::store::{Store, StoreError};

/// Revocation request parameters (RFC 7009).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevocationRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Revoke an access or refresh token.
///
/// Unknown tokens are not an error. Without credentials only tokens of
/// public clients can be revoked.
pub(crate) async fn revoke(
    store: &Arc<dyn Store>,
    grants: &GrantProcessor,
    req: RevocationRequest,
    credentials: Option<ClientCredentials>,
) -> Result<(), OAuth2Error> {
    let value = req
        .token
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::InvalidRequest("missing 'token' parameter".into()))?;

    let authenticated = match credentials {
        Some(creds) => Some(grants.authenticate_client(Some(creds)).await?),
        None => None,
    };

    let refresh_first = req.token_type_hint.as_deref() == Some("refresh_token");
    let Some(token) = find(store.as_ref(), value, refresh_first).await? else {
        return Ok(());
    };

    match &authenticated {
        Some(client) if client.id != token.client_id => return Ok(()),
        Some(_) => {}
        None => {
            let owner = match store.get_client(&token.client_id).await {
                Ok(client) => client,
                Err(StoreError::NotFound) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if owner.confidential {
                return Err(OAuth2Error::InvalidClient("client authentication required".into()));
            }
        }
    }

    match store.revoke_token(token.id).await {
        Ok(()) | Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }
    debug!(client_id = %token.client_id, token_id = %token.id, "Token revoked");
    Ok(())
}

async fn find(
    store: &dyn Store,
    value: &str,
    refresh_first: bool,
) -> Result<Option<Token>, OAuth2Error> {
    for as_refresh in [refresh_first, !refresh_first] {
        let found = if as_refresh {
            store.get_token_by_refresh(value).await
        } else {
            store.get_token_by_access(value).await
        };
        match found {
            Ok(token) => return Ok(Some(token)),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}
