// Errors raised while reading, merging and validating settings

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid {format} configuration: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Invalid setting {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Cannot convert setting: {0}")]
    Deserialization(String),

    #[error("Cannot store setting: {0}")]
    Serialization(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl ConfigError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
