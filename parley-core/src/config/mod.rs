//! Layered configuration for the `server`, `oauth2` and `seed` sections.
//!
//! Layers, each overriding the one before:
//!
//! 1. `application.yaml`
//! 2. `application-{profile}.yaml`
//! 3. `${...}` placeholders in string values are resolved (see [`secrets`])
//! 4. environment variables named after a key, e.g. `OAUTH2_TTL_ACCESS`
//!    for `oauth2.ttl.access`
//!
//! `.env` and `.env.{profile}` are read into the process environment before
//! step 3 and never replace variables that are already set.

mod loader;
pub mod secrets;
pub mod value;

use std::path::Path;

pub use secrets::{DefaultSecretResolver, SecretResolver};
pub use value::{ConfigValue, FromConfigValue};

/// Top-level sections Parley reads. Anything else in the YAML is ignored,
/// and only environment variables starting with one of these (upper-cased)
/// count as overrides.
pub const SECTIONS: [&str; 3] = ["server", "oauth2", "seed"];

const DEFAULT_PROFILE: &str = "dev";

#[derive(Debug)]
pub enum ConfigError {
    /// No layer sets the key.
    NotFound(String),
    TypeMismatch { key: String, expected: &'static str },
    /// Unreadable file, bad YAML, or an unresolvable placeholder.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "'{key}' is not set"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "'{key}' should be {expected}")
            }
            ConfigError::Load(msg) => write!(f, "cannot load configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Flattened configuration: dotted keys such as `oauth2.ttl.code` mapped to
/// scalar values.
#[derive(Debug, Clone)]
pub struct ParleyConfig {
    values: loader::Values,
    profile: String,
}

impl ParleyConfig {
    /// Read every layer from the working directory and the environment.
    ///
    /// `PARLEY_PROFILE` wins over `profile`.
    pub fn load_with_resolver(
        profile: &str,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let profile = std::env::var("PARLEY_PROFILE").unwrap_or_else(|_| profile.to_string());
        let mut values = loader::Values::new();

        for file in ["application.yaml".to_string(), format!("application-{profile}.yaml")] {
            if let Some(text) = loader::read_layer(Path::new(&file))? {
                loader::merge_yaml(&text, &mut values)?;
            }
        }

        let _ = dotenvy::dotenv();
        let _ = dotenvy::from_filename(format!(".env.{profile}"));

        for value in values.values_mut() {
            if let ConfigValue::String(text) = value {
                if text.contains("${") {
                    *text = secrets::resolve_placeholders(text, resolver)?;
                }
            }
        }
        values.extend(loader::env_overrides(std::env::vars()));

        tracing::debug!(%profile, keys = values.len(), "Configuration loaded");
        Ok(ParleyConfig { values, profile })
    }

    /// [`load_with_resolver`](Self::load_with_resolver) with env and file
    /// placeholders. Falls back to the `dev` profile when `profile` is empty.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        let profile = if profile.is_empty() { DEFAULT_PROFILE } else { profile };
        Self::load_with_resolver(profile, &DefaultSecretResolver)
    }

    /// A single YAML layer with no placeholders or environment, for tests.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = loader::Values::new();
        loader::merge_yaml(yaml, &mut values)?;
        Ok(ParleyConfig {
            values,
            profile: profile.to_string(),
        })
    }

    pub fn empty() -> Self {
        ParleyConfig {
            values: loader::Values::new(),
            profile: "test".to_string(),
        }
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// # Errors
    ///
    /// [`ConfigError::NotFound`] when no layer sets `key`, and
    /// [`ConfigError::TypeMismatch`] when its value does not parse as `V`.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        match self.values.get(key) {
            Some(value) => V::from_config_value(value, key),
            None => Err(ConfigError::NotFound(key.to_string())),
        }
    }

    /// `default` when the key is unset or unparseable.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}
