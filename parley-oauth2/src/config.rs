use parley_core::{ConfigError, FromConfigValue, ParleyConfig};

/// Configuration for the authorization server.
#[derive(Clone, Debug)]
pub struct OAuth2Config {
    /// `iss` of ID tokens and base URL of advertised endpoints.
    pub issuer: String,
    /// Prefix for the `/oauth2/*` routes, e.g. `""` or `"/api/v3"`.
    pub base_path: String,
    pub code_ttl_secs: u64,
    pub access_ttl_secs: u64,
    /// `0` means refresh tokens never expire.
    pub refresh_ttl_secs: u64,
    pub id_token_ttl_secs: u64,
    pub refresh_enabled: bool,
    /// Resource-owner password grant (legacy).
    pub password_enabled: bool,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:3000".into(),
            base_path: String::new(),
            code_ttl_secs: 300,
            access_ttl_secs: 3600,
            refresh_ttl_secs: 30 * 24 * 3600,
            id_token_ttl_secs: 3600,
            refresh_enabled: true,
            password_enabled: true,
        }
    }
}

impl OAuth2Config {
    /// Read the `oauth2.*` keys, keeping defaults for missing ones.
    ///
    /// A present but mistyped value is an error rather than a silent default.
    pub fn from_config(config: &ParleyConfig) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            issuer: read(config, "oauth2.issuer", d.issuer)?
                .trim_end_matches('/')
                .to_string(),
            base_path: read(config, "oauth2.path", d.base_path)?
                .trim_end_matches('/')
                .to_string(),
            code_ttl_secs: read(config, "oauth2.ttl.code", d.code_ttl_secs)?,
            access_ttl_secs: read(config, "oauth2.ttl.access", d.access_ttl_secs)?,
            refresh_ttl_secs: read(config, "oauth2.ttl.refresh", d.refresh_ttl_secs)?,
            id_token_ttl_secs: read(config, "oauth2.ttl.idtoken", d.id_token_ttl_secs)?,
            refresh_enabled: read(config, "oauth2.refresh.enabled", d.refresh_enabled)?,
            password_enabled: read(config, "oauth2.password.enabled", d.password_enabled)?,
        })
    }

    /// Absolute URL of an endpoint under the base path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.issuer, self.base_path, path)
    }
}

fn read<V: FromConfigValue>(config: &ParleyConfig, key: &str, default: V) -> Result<V, ConfigError> {
    match config.get(key) {
        Err(ConfigError::NotFound(_)) => Ok(default),
        other => other,
    }
}
