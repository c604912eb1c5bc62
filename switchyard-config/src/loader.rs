// Settings files: JSON, TOML and dotenv

use crate::env::insert_path;
use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Toml => "TOML",
            FileFormat::Env => "dotenv",
        }
    }
}

/// Parses one settings file into a JSON object.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the format from the file extension; a bare `.env` counts as dotenv
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = match path.extension().and_then(|s| s.to_str()) {
            Some(ext) => ext,
            None if path.file_name().and_then(|s| s.to_str()) == Some(".env") => "env",
            None => {
                return Err(ConfigError::UnsupportedFormat(format!(
                    "{} has no extension",
                    path.display()
                )));
            }
        };
        FileFormat::from_extension(ext)
            .map(Self::new)
            .ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Map<String, Value>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.parse(&content)
    }

    /// Parse settings text; the top level must be a table/object.
    pub fn parse(&self, content: &str) -> Result<Map<String, Value>> {
        let value = match self.format {
            FileFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| self.parse_error(e))?,
            FileFormat::Toml => toml::from_str::<Value>(content).map_err(|e| self.parse_error(e))?,
            FileFormat::Env => return self.parse_env(content),
        };
        match value {
            Value::Object(map) => Ok(map),
            other => Err(ConfigError::Parse {
                format: self.format.name(),
                message: format!("expected a table at the top level, found {}", other),
            }),
        }
    }

    /// dotenv lines; `A__B=1` nests like prefixed environment variables
    fn parse_env(&self, content: &str) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        for item in dotenvy::from_read_iter(content.as_bytes()) {
            let (key, value) = item.map_err(|e| self.parse_error(e))?;
            let path: Vec<String> = key
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
                .collect();
            insert_path(&mut map, &path, Value::String(value));
        }
        Ok(map)
    }

    fn parse_error(&self, e: impl std::fmt::Display) -> ConfigError {
        ConfigError::Parse {
            format: self.format.name(),
            message: e.to_string(),
        }
    }
}
