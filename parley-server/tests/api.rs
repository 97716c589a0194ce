use std::sync::Arc;

use parley_core::ParleyConfig;
use parley_oauth2::{
    hash_secret, Client, InMemoryStore, KeyManager, OAuth2Config, ResourceOwner, Scopes, User,
    Store, UserStatus,
};
use parley_server::{app, load_keys, seed};
use parley_test::keys::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY};
use parley_test::{TestApp, TestResponse};
use serde_json::Value;

const ISSUER: &str = "https://chat.example.com";
const REDIRECT: &str = "https://app.example.com/callback";

struct Fixture {
    app: TestApp,
    alice: User,
    mallory: User,
}

fn fixture(base_path: &str) -> Fixture {
    let alice = User {
        display_name: "Alice Liddell".into(),
        password_hash: Some(hash_secret("wonderland").unwrap()),
        ..User::new("alice")
    };
    let mallory = User {
        status: UserStatus::Suspended,
        ..User::new("mallory")
    };
    let store = InMemoryStore::new()
        .with_client(
            Client::public(
                "web",
                "Web",
                Scopes::parse("openid profile read write").unwrap(),
            )
            .redirect_uri(REDIRECT),
        )
        .with_user(alice.clone())
        .with_user(mallory.clone());

    let config = OAuth2Config {
        issuer: ISSUER.into(),
        base_path: base_path.into(),
        ..OAuth2Config::default()
    };
    let keys = Arc::new(KeyManager::new(ISSUER));
    keys.load_keys(TEST_PRIVATE_KEY, TEST_PUBLIC_KEY).unwrap();

    Fixture {
        app: TestApp::new(app(config, Arc::new(store), keys)),
        alice,
        mallory,
    }
}

async fn password_token(fx: &Fixture, token_path: &str, scope: &str) -> String {
    fx.app
        .post(token_path)
        .form(&[
            ("grant_type", "password"),
            ("client_id", "web"),
            ("username", "alice"),
            ("password", "wonderland"),
            ("scope", scope),
        ])
        .send()
        .await
        .assert_ok()
        .json_path::<String>("access_token")
}

#[tokio::test]
async fn users_me_with_bearer_token() {
    let fx = fixture("");
    let token = password_token(&fx, "/oauth2/token", "read").await;

    fx.app
        .get("/api/v3/users/me")
        .bearer(&token)
        .send()
        .await
        .assert_ok()
        .assert_json_path("id", fx.alice.id.to_string())
        .assert_json_path("name", "alice")
        .assert_json_path("status", "active")
        .assert_json_path("client_id", "web")
        .assert_json_path("scope", "read");
}

#[tokio::test]
async fn users_me_with_session() {
    let fx = fixture("");
    fx.app
        .get("/api/v3/users/me")
        .extension(ResourceOwner(fx.alice.id))
        .send()
        .await
        .assert_ok()
        .assert_json_path("display_name", "Alice Liddell")
        .assert_json_path("client_id", Value::Null);
}

#[tokio::test]
async fn users_me_rejections() {
    let fx = fixture("");
    fx.app
        .get("/api/v3/users/me")
        .send()
        .await
        .assert_unauthorized()
        .assert_json_path("error", "You are not logged in");
    fx.app
        .get("/api/v3/users/me")
        .extension(ResourceOwner(fx.mallory.id))
        .send()
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn revoked_token_stops_working() {
    let fx = fixture("");
    let token = password_token(&fx, "/oauth2/token", "read").await;

    fx.app
        .post("/oauth2/revoke")
        .form(&[("token", token.as_str()), ("client_id", "web")])
        .send()
        .await
        .assert_ok();

    fx.app
        .get("/api/v3/users/me")
        .bearer(&token)
        .send()
        .await
        .assert_unauthorized()
        .assert_json_path("error", "invalid token");
}

#[tokio::test]
async fn userinfo_needs_openid_scope() {
    let fx = fixture("");
    let token = password_token(&fx, "/oauth2/token", "read").await;
    fx.app
        .get("/oauth2/userinfo")
        .bearer(&token)
        .send()
        .await
        .assert_forbidden();

    let token = password_token(&fx, "/oauth2/token", "openid").await;
    let resp: TestResponse = fx
        .app
        .get("/oauth2/userinfo")
        .bearer(&token)
        .send()
        .await
        .assert_ok()
        .assert_json_path("sub", fx.alice.id.to_string());
    assert!(resp.json::<Value>().get("name").is_none());
}

#[tokio::test]
async fn userinfo_profile_claims_under_base_path() {
    let fx = fixture("/api/v3");
    let token = password_token(&fx, "/api/v3/oauth2/token", "openid profile").await;
    fx.app
        .get("/api/v3/oauth2/userinfo")
        .bearer(&token)
        .send()
        .await
        .assert_ok()
        .assert_json_path("name", "Alice Liddell")
        .assert_json_path("preferred_username", "alice");

    // Discovery stays at the root and points at the prefixed endpoints.
    fx.app
        .get("/.well-known/openid-configuration")
        .send()
        .await
        .assert_ok()
        .assert_json_path(
            "userinfo_endpoint",
            format!("{ISSUER}/api/v3/oauth2/userinfo"),
        );
}

#[tokio::test]
async fn keys_from_inline_pem_config() {
    let mut config = ParleyConfig::empty();
    config.set(
        "oauth2.keys.private",
        parley_core::ConfigValue::String(TEST_PRIVATE_KEY.into()),
    );
    config.set(
        "oauth2.keys.public",
        parley_core::ConfigValue::String(TEST_PUBLIC_KEY.into()),
    );
    let keys = KeyManager::new(ISSUER);
    load_keys(&config, &keys).await;
    assert!(keys.is_openid_connect_available());
}

#[tokio::test]
async fn bad_key_paths_leave_oidc_off() {
    let mut config = ParleyConfig::empty();
    config.set(
        "oauth2.keys.private",
        parley_core::ConfigValue::String("/nonexistent/private.pem".into()),
    );
    config.set(
        "oauth2.keys.public",
        parley_core::ConfigValue::String("/nonexistent/public.pem".into()),
    );
    let keys = KeyManager::new(ISSUER);
    load_keys(&config, &keys).await;
    assert!(!keys.is_openid_connect_available());

    load_keys(&ParleyConfig::empty(), &keys).await;
    assert!(!keys.is_openid_connect_available());
}

#[tokio::test]
async fn swapped_keys_leave_oidc_off() {
    let mut config = ParleyConfig::empty();
    config.set(
        "oauth2.keys.private",
        parley_core::ConfigValue::String(TEST_PUBLIC_KEY.into()),
    );
    config.set(
        "oauth2.keys.public",
        parley_core::ConfigValue::String(TEST_PRIVATE_KEY.into()),
    );
    let keys = KeyManager::new(ISSUER);
    load_keys(&config, &keys).await;
    assert!(!keys.is_openid_connect_available());
}

#[tokio::test]
async fn dev_seed_defaults() {
    let config = ParleyConfig::from_yaml_str(
        "seed:\n  web:\n    redirect: \"http://localhost:8080/cb\"\n",
        "test",
    )
    .unwrap();
    let store = seed::dev_store(&config).unwrap();

    let client = store.get_client("parley-web").await.unwrap();
    assert_eq!(client.redirect_uris, vec!["http://localhost:8080/cb".to_string()]);
    assert!(!client.confidential);
    assert!(store.get_client("parley-bot").await.is_err());
}
