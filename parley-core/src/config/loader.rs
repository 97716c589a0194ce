use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::Value;
use tracing::warn;

use super::value::ConfigValue;
use super::{ConfigError, SECTIONS};

pub(crate) type Values = BTreeMap<String, ConfigValue>;

/// Contents of an optional layer file; a missing file is an empty layer.
pub(crate) fn read_layer(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::Load(format!("{}: {e}", path.display()))),
    }
}

/// Overlay one YAML document onto `values`.
///
/// Only the known sections are read. Nested mappings become dotted keys and a
/// `null` leaf unsets whatever a lower layer put there.
pub(crate) fn merge_yaml(text: &str, values: &mut Values) -> Result<(), ConfigError> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let root = match serde_yaml::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))? {
        Value::Mapping(root) => root,
        Value::Null => return Ok(()),
        _ => return Err(ConfigError::Load("top level must be a mapping".into())),
    };

    for (section, body) in root {
        let Some(section) = section.as_str().filter(|s| SECTIONS.contains(s)) else {
            warn!(section = ?section, "Ignoring unknown configuration section");
            continue;
        };
        let mut pending = vec![(section.to_string(), body)];
        while let Some((key, node)) = pending.pop() {
            match node {
                Value::Mapping(children) => {
                    for (child, node) in children {
                        let Some(child) = child.as_str() else {
                            return Err(ConfigError::Load(format!("{key}: keys must be strings")));
                        };
                        pending.push((format!("{key}.{child}"), node));
                    }
                }
                Value::Null => {
                    values.remove(&key);
                }
                leaf => {
                    let value = ConfigValue::from_yaml(&leaf).ok_or_else(|| {
                        ConfigError::Load(format!("{key}: expected a string, number or bool"))
                    })?;
                    values.insert(key, value);
                }
            }
        }
    }
    Ok(())
}

/// Environment variables that address a known section.
///
/// `OAUTH2_TTL_ACCESS` maps to `oauth2.ttl.access`; `PATH`, `HOME` and the
/// like fall outside every section and are skipped.
pub(crate) fn env_overrides(
    vars: impl IntoIterator<Item = (String, String)>,
) -> impl Iterator<Item = (String, ConfigValue)> {
    vars.into_iter().filter_map(|(name, value)| {
        let key = name.to_ascii_lowercase().replace('_', ".");
        let (section, rest) = key.split_once('.')?;
        (SECTIONS.contains(&section) && !rest.is_empty())
            .then(|| (key.clone(), ConfigValue::String(value)))
    })
}
