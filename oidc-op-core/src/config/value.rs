use std::time::Duration;

use super::ConfigError;

/// A leaf or composite value read from YAML or the environment.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub(crate) fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(*b),
            serde_yaml::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ConfigValue::Integer(i),
                (None, Some(f)) => ConfigValue::Float(f),
                _ => ConfigValue::String(n.to_string()),
            },
            serde_yaml::Value::String(s) => ConfigValue::String(s.clone()),
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Sequence(seq) => {
                ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect())
            }
            other => ConfigValue::String(format!("{other:?}")),
        }
    }

    fn mismatch(key: &str, expected: &'static str) -> ConfigError {
        ConfigError::TypeMismatch {
            key: key.to_string(),
            expected,
        }
    }
}

/// Conversion from a raw [`ConfigValue`] into a typed setting.
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(f) => Ok(f.to_string()),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            _ => Err(ConfigValue::mismatch(key, "String")),
        }
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| ConfigValue::mismatch(key, "i64")),
            _ => Err(ConfigValue::mismatch(key, "i64")),
        }
    }
}

impl FromConfigValue for u64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let i = i64::from_config_value(value, key)?;
        u64::try_from(i).map_err(|_| ConfigValue::mismatch(key, "u64"))
    }
}

impl FromConfigValue for u16 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let i = i64::from_config_value(value, key)?;
        u16::try_from(i).map_err(|_| ConfigValue::mismatch(key, "u16"))
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Bool(b) => Ok(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigValue::mismatch(key, "bool")),
            },
            _ => Err(ConfigValue::mismatch(key, "bool")),
        }
    }
}

/// Durations are written as whole seconds.
impl FromConfigValue for Duration {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        u64::from_config_value(value, key)
            .map(Duration::from_secs)
            .map_err(|_| ConfigValue::mismatch(key, "Duration (seconds)"))
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Null => Ok(None),
            v => T::from_config_value(v, key).map(Some),
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| T::from_config_value(v, &format!("{key}[{i}]")))
                .collect(),
            other => Ok(vec![T::from_config_value(other, key)?]),
        }
    }
}
