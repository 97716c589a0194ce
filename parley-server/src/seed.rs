use parley_core::{ConfigError, ParleyConfig};
use parley_oauth2::{hash_secret, Client, InMemoryStore, Scopes, User};
use tracing::info;

/// Development data: one public web client and, when configured, a
/// confidential bot client and an admin account.
///
/// ```yaml
/// seed:
///   web:
///     redirect: "http://localhost:5173/callback"
///   bot:
///     secret: "${env:PARLEY_BOT_SECRET}"
///   admin:
///     password: "${env:PARLEY_ADMIN_PASSWORD}"
/// ```
pub fn dev_store(config: &ParleyConfig) -> Result<InMemoryStore, String> {
    let redirect: String = config.get_or(
        "seed.web.redirect",
        "http://localhost:5173/callback".to_string(),
    );
    let web = Client::public(
        "parley-web",
        "Parley Web",
        scopes("openid profile read write")?,
    )
    .redirect_uri(redirect);
    let mut store = InMemoryStore::new().with_client(web);

    if let Some(secret) = optional(config, "seed.bot.secret")? {
        let bot = Client::confidential(
            "parley-bot",
            "Parley Bot",
            &secret,
            scopes("read write manage_bot")?,
        )
        .map_err(|e| e.to_string())?;
        store = store.with_client(bot);
        info!(client_id = "parley-bot", "Seeded confidential client");
    }

    if let Some(password) = optional(config, "seed.admin.password")? {
        let admin = User {
            password_hash: Some(hash_secret(&password).map_err(|e| e.to_string())?),
            display_name: "Administrator".into(),
            ..User::new("admin")
        };
        info!(user_id = %admin.id, "Seeded admin account");
        store = store.with_user(admin);
    }

    Ok(store)
}

fn scopes(raw: &str) -> Result<Scopes, String> {
    Scopes::parse(raw).map_err(|e| e.to_string())
}

fn optional(config: &ParleyConfig, key: &str) -> Result<Option<String>, String> {
    match config.get::<String>(key) {
        Ok(value) if !value.is_empty() => Ok(Some(value)),
        Ok(_) | Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}
