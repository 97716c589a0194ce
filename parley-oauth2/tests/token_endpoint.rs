mod common;

use common::{
    alice_tokens, config, fixture, fixture_with, ALICE_PASSWORD, BOT_CLIENT, BOT_SECRET,
    WEB_CLIENT,
};
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use parley_oauth2::{
    AuthorizationCode, Client, IdTokenClaims, OAuth2Config, OAuth2Server, Store, StoreError,
    StoreFuture, Token, TokenResponse, User,
};
use parley_test::{TestApp, TestResponse};
use uuid::Uuid;

fn assert_no_cache(resp: &TestResponse) {
    assert_eq!(resp.header("cache-control"), Some("no-store"));
    assert_eq!(resp.header("pragma"), Some("no-cache"));
}

#[tokio::test]
async fn unknown_grant_type() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .form(&[("grant_type", "ああああ")])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "unsupported_grant_type");
    assert_no_cache(&resp);
}

#[tokio::test]
async fn missing_grant_type() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .form(&[("client_id", WEB_CLIENT)])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "unsupported_grant_type");
    assert_no_cache(&resp);
}

#[tokio::test]
async fn no_body_is_invalid_request() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_request");
    assert_no_cache(&resp);
}

#[tokio::test]
async fn json_body_is_invalid_request() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .json(&serde_json::json!({ "grant_type": "password" }))
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_request");
}

#[tokio::test]
async fn password_grant_success() {
    let fx = fixture();
    let resp = alice_tokens(&fx, "read write").await.assert_ok();
    assert_no_cache(&resp);

    let body: TokenResponse = resp.json();
    assert_eq!(body.token_type, "Bearer");
    assert_eq!(body.scope, "read write");
    assert!(body.expires_in > 3590 && body.expires_in <= 3600);
    assert_eq!(body.access_token.len(), 48);
    assert!(body.refresh_token.is_some());
    assert!(body.id_token.is_none());

    let stored = fx.store.get_token_by_access(&body.access_token).await.unwrap();
    assert_eq!(stored.user_id, Some(fx.alice.id));
    assert_eq!(stored.client_id, WEB_CLIENT);
}

#[tokio::test]
async fn password_grant_with_openid_returns_id_token() {
    let fx = fixture();
    let body: TokenResponse = alice_tokens(&fx, "openid profile").await.assert_ok().json();
    let id_token = body.id_token.expect("id_token");

    let claims: IdTokenClaims = fx.keys.verify(&id_token, WEB_CLIENT).unwrap();
    assert_eq!(claims.sub, fx.alice.id.to_string());
    assert_eq!(claims.name.as_deref(), Some("Alice Liddell"));
    assert_eq!(claims.preferred_username.as_deref(), Some("alice"));
    assert!(claims.nonce.is_none());
}

#[tokio::test]
async fn password_grant_without_keys_has_no_id_token() {
    let fx = fixture_with(config(), false);
    let body: TokenResponse = alice_tokens(&fx, "openid read").await.assert_ok().json();
    assert!(body.id_token.is_none());
    assert_eq!(body.scope, "openid read");
}

#[tokio::test]
async fn password_grant_defaults_to_client_scope() {
    let fx = fixture();
    let body: TokenResponse = alice_tokens(&fx, "").await.assert_ok().json();
    assert_eq!(body.scope, "openid profile read write");
}

#[tokio::test]
async fn password_grant_wrong_password() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", "wrong"),
            ("client_id", WEB_CLIENT),
        ])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_grant");
    assert_no_cache(&resp);
}

#[tokio::test]
async fn password_grant_unknown_user() {
    let fx = fixture();
    let unknown = fx
        .app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "nobody"),
            ("password", ALICE_PASSWORD),
            ("client_id", WEB_CLIENT),
        ])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_grant");

    // Indistinguishable from a wrong password for a real account.
    let wrong = fx
        .app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", "wrong"),
            ("client_id", WEB_CLIENT),
        ])
        .send()
        .await
        .assert_bad_request();
    assert_eq!(unknown.body, wrong.body);
}

#[tokio::test]
async fn password_grant_suspended_user() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "mallory"),
            ("password", common::MALLORY_PASSWORD),
            ("client_id", WEB_CLIENT),
        ])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_grant");
}

#[tokio::test]
async fn password_grant_missing_username() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("password", ALICE_PASSWORD),
            ("client_id", WEB_CLIENT),
        ])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_request");
}

#[tokio::test]
async fn password_grant_can_be_disabled() {
    let fx = fixture_with(
        OAuth2Config {
            password_enabled: false,
            ..config()
        },
        true,
    );
    alice_tokens(&fx, "read")
        .await
        .assert_bad_request()
        .assert_json_path("error", "unsupported_grant_type");
}

#[tokio::test]
async fn scope_beyond_client_allowance() {
    let fx = fixture();
    alice_tokens(&fx, "read manage_bot")
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_scope");
}

#[tokio::test]
async fn unknown_scope() {
    let fx = fixture();
    alice_tokens(&fx, "read admin")
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_scope");
}

#[tokio::test]
async fn unknown_client() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", ALICE_PASSWORD),
            ("client_id", "ghost"),
        ])
        .send()
        .await
        .assert_unauthorized()
        .assert_json_path("error", "invalid_client");
    assert_no_cache(&resp);
}

#[tokio::test]
async fn missing_client_is_invalid_client() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", ALICE_PASSWORD),
        ])
        .send()
        .await
        .assert_unauthorized()
        .assert_json_path("error", "invalid_client");
}

#[tokio::test]
async fn revoked_client_is_invalid_client() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", ALICE_PASSWORD),
            ("client_id", common::REVOKED_CLIENT),
        ])
        .send()
        .await
        .assert_unauthorized()
        .assert_json_path("error", "invalid_client");
}

#[tokio::test]
async fn client_credentials_with_basic_auth() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .basic_auth(BOT_CLIENT, BOT_SECRET)
        .form(&[("grant_type", "client_credentials"), ("scope", "read manage_bot")])
        .send()
        .await
        .assert_ok();
    assert_no_cache(&resp);

    let body: TokenResponse = resp.json();
    assert_eq!(body.scope, "read manage_bot");
    assert!(body.refresh_token.is_none());
    assert!(body.id_token.is_none());

    let stored = fx.store.get_token_by_access(&body.access_token).await.unwrap();
    assert_eq!(stored.user_id, None);
    assert_eq!(stored.client_id, BOT_CLIENT);
}

#[tokio::test]
async fn client_credentials_with_post_body() {
    let fx = fixture();
    let body: TokenResponse = fx
        .app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", BOT_CLIENT),
            ("client_secret", BOT_SECRET),
            ("scope", "openid read"),
        ])
        .send()
        .await
        .assert_ok()
        .json();
    // No user, so no ID token even with openid.
    assert!(body.id_token.is_none());
}

#[tokio::test]
async fn client_credentials_wrong_secret() {
    let fx = fixture();
    let resp = fx
        .app
        .post("/oauth2/token")
        .basic_auth(BOT_CLIENT, "nope")
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .assert_unauthorized()
        .assert_json_path("error", "invalid_client");
    assert_eq!(resp.header("www-authenticate"), Some("Basic realm=\"oauth2\""));
    assert_no_cache(&resp);
}

#[tokio::test]
async fn client_credentials_requires_confidential_client() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .form(&[("grant_type", "client_credentials"), ("client_id", WEB_CLIENT)])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "unauthorized_client");
}

#[tokio::test]
async fn credentials_in_header_and_body_conflict() {
    let fx = fixture();
    fx.app
        .post("/oauth2/token")
        .basic_auth(BOT_CLIENT, BOT_SECRET)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", BOT_CLIENT),
            ("client_secret", BOT_SECRET),
        ])
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("error", "invalid_request");
}

#[tokio::test]
async fn other_methods_are_rejected_without_caching() {
    let fx = fixture();
    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let resp = fx
            .app
            .request(method, "/oauth2/token")
            .send()
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED)
            .assert_json_path("error", "invalid_request");
        assert_eq!(resp.header("allow"), Some("POST"));
        assert_no_cache(&resp);
    }
}

/// A backend that never answers in time.
struct TimingOutStore;

impl Store for TimingOutStore {
    fn get_client<'a>(&'a self, _id: &'a str) -> StoreFuture<'a, Client> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn save_authorization_code(&self, _code: AuthorizationCode) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn consume_authorization_code<'a>(
        &'a self,
        _code: &'a str,
    ) -> StoreFuture<'a, AuthorizationCode> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn save_token(&self, _token: Token) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn get_token_by_access<'a>(&'a self, _access_token: &'a str) -> StoreFuture<'a, Token> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn get_token_by_refresh<'a>(&'a self, _refresh_token: &'a str) -> StoreFuture<'a, Token> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn consume_refresh_token<'a>(&'a self, _refresh_token: &'a str) -> StoreFuture<'a, Token> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn revoke_token(&self, _id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn get_user(&self, _id: Uuid) -> StoreFuture<'_, User> {
        Box::pin(async { Err(StoreError::Timeout) })
    }

    fn get_user_by_name<'a>(&'a self, _name: &'a str) -> StoreFuture<'a, User> {
        Box::pin(async { Err(StoreError::Timeout) })
    }
}

#[tokio::test]
async fn store_timeout_is_a_server_error() {
    let app = TestApp::new(OAuth2Server::new(Arc::new(TimingOutStore)).router());
    let resp = app
        .post("/oauth2/token")
        .basic_auth(BOT_CLIENT, BOT_SECRET)
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_json_path("error", "server_error")
        .assert_json_path("error_description", "internal server error");
    assert!(!resp.text().contains("timed out"));
    assert_no_cache(&resp);
}
