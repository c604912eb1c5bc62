// Dispatch configuration

use serde::{Deserialize, Serialize};

/// Settings read by the dispatch server at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Prefix prepended to every registered pattern
    pub root_prefix: String,
    /// Render 5xx error messages verbatim instead of a generic one
    pub debug: bool,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_origin: String,
    /// Preflight cache lifetime in seconds
    pub max_age: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            root_prefix: "/api".to_string(),
            debug: false,
            allow_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_headers: ["Content-Type", "Authorization", "Accept", "X-Api-Key"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_origin: "*".to_string(),
            max_age: 86400,
        }
    }
}

impl DispatchConfig {
    pub fn with_root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.root_prefix = prefix.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Fixed header set of every `OPTIONS` response
    pub fn options_headers(&self) -> Vec<(String, String)> {
        let methods = self.allow_methods.join(", ");
        vec![
            ("Allow".to_string(), methods.clone()),
            ("Access-Control-Allow-Methods".to_string(), methods),
            (
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.join(", "),
            ),
            (
                "Access-Control-Allow-Origin".to_string(),
                self.allow_origin.clone(),
            ),
            ("Access-Control-Max-Age".to_string(), self.max_age.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.root_prefix, "/api");
        assert!(!config.debug);
        let headers = config.options_headers();
        assert_eq!(headers[0].0, "Allow");
        assert_eq!(headers[0].1, "GET, POST, PUT, PATCH, DELETE, OPTIONS");
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{"root_prefix": "/v2", "debug": true}"#).unwrap();
        assert_eq!(config.root_prefix, "/v2");
        assert!(config.debug);
        assert_eq!(config.allow_origin, "*");
        assert_eq!(config.max_age, 86400);
    }
}
