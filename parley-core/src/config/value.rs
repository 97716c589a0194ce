use super::ConfigError;

/// A scalar leaf of the configuration tree.
///
/// Environment overrides always arrive as `String`; the typed accessors parse
/// them, so `OAUTH2_TTL_ACCESS=60` reads the same as `ttl: { access: 60 }`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Bool(bool),
}

impl ConfigValue {
    /// Convert a YAML scalar. Floats and very large numbers are kept as text.
    pub(crate) fn from_yaml(node: &serde_yaml::Value) -> Option<Self> {
        match node {
            serde_yaml::Value::String(s) => Some(ConfigValue::String(s.clone())),
            serde_yaml::Value::Bool(b) => Some(ConfigValue::Bool(*b)),
            serde_yaml::Value::Number(n) => Some(
                n.as_i64()
                    .map(ConfigValue::Integer)
                    .unwrap_or_else(|| ConfigValue::String(n.to_string())),
            ),
            _ => None,
        }
    }
}

/// Typed view of a [`ConfigValue`], used by [`ParleyConfig::get`](super::ParleyConfig::get).
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, _key: &str) -> Result<Self, ConfigError> {
        Ok(match value {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Bool(b) => b.to_string(),
        })
    }
}

/// TTLs in seconds.
impl FromConfigValue for u64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Integer(i) => u64::try_from(*i).map_err(|_| mismatch(key, "seconds")),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(key, "seconds")),
            ConfigValue::Bool(_) => Err(mismatch(key, "seconds")),
        }
    }
}

/// Feature switches such as `oauth2.refresh.enabled`.
impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let text = match value {
            ConfigValue::Bool(b) => return Ok(*b),
            ConfigValue::String(s) => s.trim(),
            ConfigValue::Integer(_) => return Err(mismatch(key, "a switch")),
        };
        if ["true", "yes", "on", "1"].iter().any(|t| text.eq_ignore_ascii_case(t)) {
            Ok(true)
        } else if ["false", "no", "off", "0"].iter().any(|t| text.eq_ignore_ascii_case(t)) {
            Ok(false)
        } else {
            Err(mismatch(key, "a switch"))
        }
    }
}
