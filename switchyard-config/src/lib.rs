// Configuration management for the Switchyard dispatch server

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{ServerSettings, ENV_PREFIX};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Layered settings tree.
///
/// Sources are merged in the order they are loaded; later sources win key by
/// key, nested objects are merged rather than replaced. Keys are addressed
/// with dots: `dispatch.root_prefix`.
#[derive(Clone, Default)]
pub struct ConfigManager {
    tree: Arc<RwLock<Map<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only `PREFIX_*` variables are read from the environment
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            tree: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge the process environment
    pub fn load_env(&self) {
        let vars = EnvLoader::new(self.env_prefix.clone()).load();
        debug!(keys = vars.len(), "Merging environment settings");
        merge(&mut self.write(), vars);
    }

    /// Merge the `PREFIX_*` entries of a `.env` file. The process environment is left untouched.
    ///
    /// Without a path `.env` is searched from the working directory upwards; not finding one is not an error.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        let iter = match path {
            Some(path) => dotenvy::from_path_iter(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                source: std::io::Error::other(e.to_string()),
            })?,
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => iter,
                Err(_) => return Ok(()),
            },
        };

        let vars = iter
            .collect::<std::result::Result<Vec<(String, String)>, _>>()
            .map_err(|e| ConfigError::Parse {
                format: "dotenv",
                message: e.to_string(),
            })?;
        let tree = EnvLoader::new(self.env_prefix.clone()).collect(vars);
        debug!(keys = tree.len(), "Merging .env settings");
        merge(&mut self.write(), tree);
        Ok(())
    }

    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let map = ConfigLoader::new(format).load_file(path)?;
        merge(&mut self.write(), map);
        Ok(())
    }

    /// Load a file whose format follows from its extension
    pub fn load_file_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ConfigLoader::auto(path)?.format();
        self.load_file(path, format)
    }

    /// Merge an object value; anything else is ignored
    pub fn merge_value(&self, value: Value) {
        if let Value::Object(map) = value {
            merge(&mut self.write(), map);
        }
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value =
            serde_json::to_value(value).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        let path: Vec<String> = key.split('.').map(String::from).collect();
        env::insert_path(&mut self.write(), &path, value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let tree = self.read();
        let value = lookup(&tree, key).ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::Deserialization(format!("{}: {}", key, e)))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        lookup(&self.read(), key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Merge another manager's settings over these
    pub fn merge(&self, other: &ConfigManager) {
        let incoming = other.read().clone();
        merge(&mut self.write(), incoming);
    }

    /// Deserialize the whole tree into `T` and validate it
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let value = Value::Object(self.read().clone());
        let settings: T = serde_json::from_value(value)
            .map_err(|e| ConfigError::Deserialization(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("keys", &self.keys())
            .field("env_prefix", &self.env_prefix)
            .finish()
    }
}

fn lookup<'t>(tree: &'t Map<String, Value>, key: &str) -> Option<&'t Value> {
    let mut parts = key.split('.');
    let mut value = tree.get(parts.next()?)?;
    for part in parts {
        value = value.as_object()?.get(part)?;
    }
    Some(value)
}

fn merge(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Object(nested) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge(existing, nested),
                _ => {
                    target.insert(key, Value::Object(nested));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}
