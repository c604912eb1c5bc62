// Process-level settings for the Switchyard binaries

use crate::{ConfigManager, ConfigValidator, Result, Validate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use switchyard_core::DispatchConfig;
use tracing::debug;

/// Environment prefix for every setting (`SWITCHYARD_PORT`, `SWITCHYARD_DISPATCH__DEBUG`, ...)
pub const ENV_PREFIX: &str = "SWITCHYARD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
    pub log_level: String,
    /// Keys accepted by the `api-key` middleware. A list, or one comma-separated string.
    #[serde(deserialize_with = "key_list")]
    pub api_keys: Vec<String>,
    pub dispatch: DispatchConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_bytes: 1024 * 1024,
            log_level: "info".to_string(),
            api_keys: Vec::new(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ServerSettings {
    /// Defaults, then `.env`, then the optional file, then `SWITCHYARD_*` variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(None, file)
    }

    /// Like [`ServerSettings::load`] with an explicit `.env` path
    pub fn load_from(dotenv: Option<&Path>, file: Option<&Path>) -> Result<Self> {
        let manager = ConfigManager::with_prefix(ENV_PREFIX);
        manager.merge_value(serde_json::to_value(Self::default()).map_err(|e| {
            crate::ConfigError::Serialization(e.to_string())
        })?);
        manager.load_dotenv(dotenv)?;
        if let Some(path) = file {
            debug!(path = %path.display(), "Loading settings file");
            manager.load_file_auto(path)?;
        }
        manager.load_env();
        manager.load_validated()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| crate::ConfigError::validation("host", format!("{}", e)))
    }
}

/// `SWITCHYARD_API_KEYS=a,b` arrives as a string (or a number), files usually give a list.
fn key_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let split = |raw: &str| -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    };
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::String(raw) => Ok(split(&raw)),
        Value::Number(n) => Ok(vec![n.to_string()]),
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        other => Err(serde::de::Error::custom(format!(
            "expected a list of API keys, got {}",
            other
        ))),
    }
}

impl Validate for ServerSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.host, "host")?;
        ConfigValidator::is_port(self.port, "port")?;
        ConfigValidator::in_range(self.max_body_bytes, 1, 64 * 1024 * 1024, "max_body_bytes")?;
        ConfigValidator::one_of(
            &self.log_level,
            &["trace", "debug", "info", "warn", "error"],
            "log_level",
        )?;
        self.dispatch.validate()
    }
}
