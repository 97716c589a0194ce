#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use parley_oauth2::{
    hash_secret, Client, InMemoryStore, KeyManager, OAuth2Config, OAuth2Server, ResourceOwner,
    Scopes, User, UserStatus,
};
use parley_test::keys::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY};
use parley_test::{TestApp, TestResponse};

pub const ISSUER: &str = "https://chat.example.com";

pub const WEB_CLIENT: &str = "web";
pub const WEB_REDIRECT: &str = "https://app.example.com/callback";

pub const BOT_CLIENT: &str = "bot";
pub const BOT_SECRET: &str = "bot-secret";
pub const BOT_REDIRECT: &str = "https://bot.example.com/cb";

pub const REVOKED_CLIENT: &str = "retired";

pub const ALICE_PASSWORD: &str = "alice-password";
pub const MALLORY_PASSWORD: &str = "mallory-password";

// RFC 7636 Appendix B
pub const PKCE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const PKCE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

/// Argon2 is slow in debug builds; hash each fixture secret once.
fn cached_hash(cell: &'static OnceLock<String>, secret: &str) -> String {
    cell.get_or_init(|| hash_secret(secret).unwrap()).clone()
}

static BOT_HASH: OnceLock<String> = OnceLock::new();
static ALICE_HASH: OnceLock<String> = OnceLock::new();
static MALLORY_HASH: OnceLock<String> = OnceLock::new();

pub struct Fixture {
    pub app: TestApp,
    pub store: InMemoryStore,
    pub keys: Arc<KeyManager>,
    pub alice: User,
    pub mallory: User,
}

impl Fixture {
    pub fn owner(&self) -> ResourceOwner {
        ResourceOwner(self.alice.id)
    }
}

pub fn config() -> OAuth2Config {
    OAuth2Config {
        issuer: ISSUER.into(),
        ..OAuth2Config::default()
    }
}

/// Server with a loaded key pair and default configuration.
pub fn fixture() -> Fixture {
    fixture_with(config(), true)
}

pub fn fixture_with(config: OAuth2Config, load_keys: bool) -> Fixture {
    let web = Client::public(
        WEB_CLIENT,
        "Web client",
        Scopes::parse("openid profile read write").unwrap(),
    )
    .redirect_uri(WEB_REDIRECT);

    let bot = Client {
        confidential: true,
        secret_hash: Some(cached_hash(&BOT_HASH, BOT_SECRET)),
        ..Client::public(
            BOT_CLIENT,
            "Bot client",
            Scopes::parse("openid read write manage_bot").unwrap(),
        )
    }
    .redirect_uri(BOT_REDIRECT);

    let retired = Client {
        revoked: true,
        ..Client::public(REVOKED_CLIENT, "Retired client", Scopes::parse("read").unwrap())
    }
    .redirect_uri(WEB_REDIRECT);

    let alice = User {
        password_hash: Some(cached_hash(&ALICE_HASH, ALICE_PASSWORD)),
        display_name: "Alice Liddell".into(),
        ..User::new("alice")
    };
    let mallory = User {
        password_hash: Some(cached_hash(&MALLORY_HASH, MALLORY_PASSWORD)),
        status: UserStatus::Suspended,
        ..User::new("mallory")
    };

    let store = InMemoryStore::new()
        .with_client(web)
        .with_client(bot)
        .with_client(retired)
        .with_user(alice.clone())
        .with_user(mallory.clone());

    let keys = Arc::new(KeyManager::new(config.issuer.clone()));
    if load_keys {
        keys.load_keys(TEST_PRIVATE_KEY, TEST_PUBLIC_KEY).unwrap();
    }

    let router = OAuth2Server::new(Arc::new(store.clone()))
        .with_config(config)
        .with_key_manager(keys.clone())
        .router();

    Fixture {
        app: TestApp::new(router),
        store,
        keys,
        alice,
        mallory,
    }
}

/// Build an authorize URL from query parameters.
pub fn authorize_url(params: &[(&str, &str)]) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("/oauth2/authorize?{query}")
}

/// Run the authorize step as alice and return the redirect.
pub async fn authorize(fx: &Fixture, params: &[(&str, &str)]) -> TestResponse {
    fx.app
        .get(&authorize_url(params))
        .extension(fx.owner())
        .send()
        .await
}

/// Obtain a code for the web client with the given scope.
pub async fn web_code(fx: &Fixture, scope: &str) -> String {
    authorize(
        fx,
        &[
            ("response_type", "code"),
            ("client_id", WEB_CLIENT),
            ("redirect_uri", WEB_REDIRECT),
            ("scope", scope),
            ("state", "xyz"),
            ("nonce", "n-0S6_WzA2Mj"),
        ],
    )
    .await
    .assert_found()
    .query_param("code")
    .expect("code in redirect")
}

/// Redeem a code for the web client.
pub async fn redeem(fx: &Fixture, code: &str) -> TestResponse {
    fx.app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", WEB_REDIRECT),
            ("client_id", WEB_CLIENT),
        ])
        .send()
        .await
}

/// Password grant for alice through the web client.
pub async fn alice_tokens(fx: &Fixture, scope: &str) -> TestResponse {
    fx.app
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", ALICE_PASSWORD),
            ("client_id", WEB_CLIENT),
            ("scope", scope),
        ])
        .send()
        .await
}
