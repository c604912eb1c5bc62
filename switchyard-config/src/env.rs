// Prefixed environment variables as a settings tree

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::env;

/// Reads `PREFIX_*` variables into a nested settings object.
///
/// `SWITCHYARD_PORT=9000` becomes `{"port": 9000}` and a double underscore
/// descends a level: `SWITCHYARD_DISPATCH__ROOT_PREFIX=/v1` becomes
/// `{"dispatch": {"root_prefix": "/v1"}}`. Values that read as booleans or
/// numbers are stored as such.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load every matching variable of the process environment
    pub fn load(&self) -> Map<String, Value> {
        self.collect(env::vars())
    }

    /// Build the settings tree from explicit `(name, value)` pairs
    pub fn collect<I>(&self, vars: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tree = Map::new();
        for (key, value) in vars {
            let Some(path) = self.strip(&key) else {
                continue;
            };
            let segments: Vec<String> = path
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
                .collect();
            if segments.is_empty() {
                continue;
            }
            insert_path(&mut tree, &segments, typed(&value));
        }
        tree
    }

    /// Read one variable, prefix applied
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };
        env::var(&full_key).map_err(ConfigError::Env)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn strip<'k>(&self, key: &'k str) -> Option<&'k str> {
        match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str())?.strip_prefix('_'),
            None => Some(key),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Set `value` at `path`, creating intermediate objects as needed.
pub(crate) fn insert_path(tree: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = tree;
    for segment in parents {
        let entry = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    node.insert(last.clone(), value);
}

fn typed(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}
