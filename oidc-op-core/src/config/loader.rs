use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::ConfigError;

/// Read a YAML file into `values`. A missing file is not an error.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    load_yaml_str(&content, values)
}

pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten nested mappings into dot-separated keys (`oidc.server.addr`).
///
/// Sequences are stored whole under their parent key.
fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, ConfigValue>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let segment = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let key = if prefix.is_empty() {
                    segment
                } else {
                    format!("{prefix}.{segment}")
                };
                flatten_yaml(&key, v, out);
            }
        }
        leaf if !prefix.is_empty() => {
            out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
        }
        _ => {}
    }
}

/// Environment variable name to config key: `OIDC_SERVER_ADDR` -> `oidc.server.addr`.
pub(crate) fn env_key(name: &str) -> String {
    name.to_lowercase().replace('_', ".")
}

/// Replace `${VAR}`, `${env:VAR}` and `${file:/path}` references in a string.
pub(crate) fn resolve_placeholders(raw: &str) -> Result<String, ConfigError> {
    let mut out = raw.to_string();
    let mut from = 0;
    while let Some(offset) = out[from..].find("${") {
        let start = from + offset;
        let len = out[start..]
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("unclosed placeholder in '{raw}'")))?;
        let reference = out[start + 2..start + len].trim().to_string();
        let resolved = if let Some(path) = reference.strip_prefix("file:") {
            std::fs::read_to_string(path.trim())
                .map(|s| s.trim().to_string())
                .map_err(|e| ConfigError::Load(format!("secret file '{}': {e}", path.trim())))?
        } else {
            let var = reference.strip_prefix("env:").unwrap_or(&reference).trim();
            std::env::var(var).map_err(|_| ConfigError::NotFound(format!("env:{var}")))?
        };
        out.replace_range(start..start + len + 1, &resolved);
        // Substituted text is taken literally.
        from = start + resolved.len();
    }
    Ok(out)
}
