// Settings validation

use crate::{ConfigError, Result};
use switchyard_core::DispatchConfig;

/// Implemented by settings structs checked after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field-level checks shared by settings structs
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::validation(field, "cannot be empty"));
        }
        Ok(())
    }

    pub fn non_empty_list<T>(values: &[T], field: &str) -> Result<()> {
        if values.is_empty() {
            return Err(ConfigError::validation(field, "needs at least one entry"));
        }
        Ok(())
    }

    pub fn in_range<T: PartialOrd + std::fmt::Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::validation(
                field,
                format!("{} is outside {}..={}", value, min, max),
            ));
        }
        Ok(())
    }

    pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Result<()> {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            return Err(ConfigError::validation(
                field,
                format!("{:?} is not one of {}", value, allowed.join(", ")),
            ));
        }
        Ok(())
    }

    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::validation(field, "port 0 is not allowed"));
        }
        Ok(())
    }

    /// Empty, or starts with `/` and has no trailing `/`
    pub fn path_prefix(value: &str, field: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        if !value.starts_with('/') {
            return Err(ConfigError::validation(field, "must start with '/'"));
        }
        if value.ends_with('/') {
            return Err(ConfigError::validation(field, "must not end with '/'"));
        }
        Ok(())
    }
}

impl Validate for DispatchConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::path_prefix(&self.root_prefix, "dispatch.root_prefix")?;
        ConfigValidator::non_empty_list(&self.allow_methods, "dispatch.allow_methods")?;
        ConfigValidator::non_empty_list(&self.allow_headers, "dispatch.allow_headers")?;
        ConfigValidator::not_empty(&self.allow_origin, "dispatch.allow_origin")?;
        for method in &self.allow_methods {
            ConfigValidator::one_of(
                method,
                &["GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH", "DELETE"],
                "dispatch.allow_methods",
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix() {
        assert!(ConfigValidator::path_prefix("/api", "p").is_ok());
        assert!(ConfigValidator::path_prefix("", "p").is_ok());
        assert!(ConfigValidator::path_prefix("api", "p").is_err());
        assert!(ConfigValidator::path_prefix("/api/", "p").is_err());
    }

    #[test]
    fn test_range_and_port() {
        assert!(ConfigValidator::in_range(5, 1, 10, "n").is_ok());
        assert!(ConfigValidator::in_range(11, 1, 10, "n").is_err());
        assert!(ConfigValidator::is_port(8080, "port").is_ok());
        assert!(ConfigValidator::is_port(0, "port").is_err());
    }

    #[test]
    fn test_dispatch_config() {
        assert!(DispatchConfig::default().validate().is_ok());

        let mut config = DispatchConfig::default();
        config.allow_methods.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dispatch.allow_methods"));

        let config = DispatchConfig::default().with_root_prefix("/api/");
        assert!(config.validate().is_err());

        let mut config = DispatchConfig::default();
        config.allow_methods.push("TRACE".into());
        assert!(config.validate().is_err());
    }
}
