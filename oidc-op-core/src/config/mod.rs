mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use value::{ConfigValue, FromConfigValue};

/// A single failed check reported by [`ConfigError::Validation`].
#[derive(Debug, Clone)]
pub struct ConfigValidationDetail {
    pub key: String,
    pub message: String,
}

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O, YAML or placeholder error while loading.
    Load(String),
    /// Values were present and well typed but semantically invalid.
    Validation(Vec<ConfigValidationDetail>),
}

impl ConfigError {
    /// Shorthand for a single-entry [`ConfigError::Validation`].
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Validation(vec![ConfigValidationDetail {
            key: key.into(),
            message: message.into(),
        }])
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Validation(details) => {
                write!(f, "Config validation errors:")?;
                for detail in details {
                    write!(f, "\n  - {}: {}", detail.key, detail.message)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Provider configuration loaded from YAML files, `.env` files and the environment.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml`
/// 2. `application-{profile}.yaml`
/// 3. `.env`, then `.env.{profile}` (never overwrite variables already set)
/// 4. Environment variables (`OIDC_SERVER_ADDR` overrides `oidc.server.addr`)
///
/// `${VAR}`, `${env:VAR}` and `${file:/path}` placeholders in string values
/// are resolved after the YAML layers are merged.
///
/// The profile is taken from `OIDC_PROFILE`, falling back to the argument.
#[derive(Debug, Clone)]
pub struct OpConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl OpConfig {
    /// Load configuration for `profile` from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), profile)
    }

    /// Load configuration for `profile` with YAML files looked up in `dir`.
    pub fn load_from(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let profile = std::env::var("OIDC_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("application.yaml"), &mut values)?;
        loader::load_yaml_file(&dir.join(format!("application-{profile}.yaml")), &mut values)?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{profile}")));

        resolve_placeholders(&mut values)?;

        for (name, value) in std::env::vars() {
            values.insert(loader::env_key(&name), ConfigValue::String(value));
        }

        Ok(OpConfig { values, profile })
    }

    /// Build a config from a YAML document, without touching files or the environment.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(OpConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// An empty config; every typed read falls back to its default.
    pub fn empty() -> Self {
        OpConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Typed read of a dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Typed read that falls back to `default` only when the key is absent.
    ///
    /// A present but ill-typed value is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.values.get(key) {
            Some(value) => V::from_config_value(value, key),
            None => Ok(default),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

fn resolve_placeholders(values: &mut HashMap<String, ConfigValue>) -> Result<(), ConfigError> {
    for value in values.values_mut() {
        if let ConfigValue::String(s) = value {
            if s.contains("${") {
                *s = loader::resolve_placeholders(s)?;
            }
        }
    }
    Ok(())
}
