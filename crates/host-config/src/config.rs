use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::static_config::{
    StaticConfigItem, STATIC_CONFIG_TABLE, STORAGE_ACQUIRE_TIMEOUT_MS, STORAGE_PASSWORD,
    STORAGE_SQLITE_PATH, STORAGE_URL, STORAGE_USER,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    values: HashMap<String, String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub acquire_timeout: Duration,
}

impl SystemConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .map(str::to_string)
            .or_else(|| default_value(key))
            .unwrap_or_default()
    }

    pub fn get_number(&self, key: &str) -> i64 {
        self.get(key)
            .and_then(parse_number)
            .or_else(|| default_value(key).and_then(|value| parse_number(&value)))
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .and_then(parse_bool)
            .or_else(|| default_value(key).and_then(|value| parse_bool(&value)))
            .unwrap_or(false)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn storage(&self) -> StorageSettings {
        let mut url = self.get_string(STORAGE_URL).trim().to_string();
        if url.is_empty() {
            url = format!("sqlite://{}", self.get_string(STORAGE_SQLITE_PATH));
        }
        let timeout_ms = self.get_number(STORAGE_ACQUIRE_TIMEOUT_MS).max(0) as u64;
        StorageSettings {
            url,
            user: self.get_string(STORAGE_USER),
            password: self.get_string(STORAGE_PASSWORD),
            acquire_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config read error: {0}")]
    Io(String),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("type mismatch for key {0}: expected {1}")]
    TypeMismatch(String, String),
}

pub struct SystemConfigLoader;

impl SystemConfigLoader {
    pub fn from_str(input: &str) -> Result<SystemConfig, ConfigError> {
        let value: toml::Value =
            toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let mut values = HashMap::new();
        flatten_values(&mut values, String::new(), &value)?;
        Ok(SystemConfig { values })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<SystemConfig, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        Self::from_str(&input)
    }
}

fn flatten_values(
    output: &mut HashMap<String, String>,
    prefix: String,
    value: &toml::Value,
) -> Result<(), ConfigError> {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                let next = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_values(output, next, nested)?;
            }
            Ok(())
        }
        toml::Value::String(value) => insert_checked(output, &prefix, value.to_string(), "string"),
        toml::Value::Integer(value) => insert_checked(output, &prefix, value.to_string(), "number"),
        toml::Value::Float(value) => insert_checked(output, &prefix, value.to_string(), "number"),
        toml::Value::Boolean(value) => insert_checked(output, &prefix, value.to_string(), "boolean"),
        _ => Err(ConfigError::TypeMismatch(
            prefix,
            "string|number|boolean".to_string(),
        )),
    }
}

fn insert_checked(
    output: &mut HashMap<String, String>,
    key: &str,
    value: String,
    actual_type: &str,
) -> Result<(), ConfigError> {
    let item = config_item(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    if item.value_type != actual_type {
        return Err(ConfigError::TypeMismatch(
            key.to_string(),
            item.value_type.to_string(),
        ));
    }
    output.insert(key.to_string(), value);
    Ok(())
}

fn config_item(key: &str) -> Option<&'static StaticConfigItem> {
    STATIC_CONFIG_TABLE.iter().find(|item| item.key == key)
}

fn default_value(key: &str) -> Option<String> {
    config_item(key).map(|item| item.default_value.to_string())
}

fn parse_number(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|number| number as i64))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
