// The request object passed through middleware into the terminal handler

use crate::{Action, Error, HttpMethod, RequestData};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A resolved request: the inbound snapshot plus the [`Action`] it resolved to.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Map<String, Value>,
    pub raw_body: Bytes,
    pub form_params: HashMap<String, String>,
    pub action: Action,
    /// Values attached by middleware for handlers further down the chain
    pub attributes: HashMap<String, String>,
}

impl Request {
    pub fn new(method: HttpMethod, data: RequestData, action: Action) -> Self {
        let form_params = data.form_params();
        Self {
            method,
            headers: data.headers,
            body: data.parsed_body,
            raw_body: data.raw_body,
            form_params,
            action,
            attributes: HashMap::new(),
        }
    }

    /// Normalized request path
    pub fn uri(&self) -> &str {
        &self.action.uri
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.action.path_params.get(name).map(String::as_str)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&str> {
        self.action.query_params.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Look up a bare key: body, then path, then query, then form-encoded.
    pub fn input(&self, key: &str) -> Option<String> {
        if let Some(value) = self.body.get(key) {
            return Some(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        self.param(key)
            .or_else(|| self.query(key))
            .or_else(|| self.form_params.get(key).map(String::as_str))
            .map(String::from)
    }

    /// Deserialize the raw body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.raw_body).map_err(|e| Error::http(400, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::handler_fn;
    use crate::{RouteEntry, Target};
    use serde_json::json;
    use std::sync::Arc;

    fn action() -> Action {
        let target = Target::Closure(handler_fn(|_req| async { Ok(()) }));
        let route = Arc::new(RouteEntry::new(HttpMethod::POST, "/api/items/{key}", target.clone()));
        Action {
            uri: "/api/items/abc".into(),
            route,
            target,
            path_params: HashMap::from([("key".to_string(), "path".to_string())]),
            query_params: HashMap::from([
                ("key".to_string(), "query".to_string()),
                ("page".to_string(), "2".to_string()),
            ]),
            middleware: Vec::new(),
        }
    }

    #[test]
    fn test_input_precedence() {
        let data = RequestData::new("POST", "/api/items/abc").with_json(json!({"key": "body", "n": 3}));
        let req = Request::new(HttpMethod::POST, data, action());
        assert_eq!(req.input("key").as_deref(), Some("body"));
        assert_eq!(req.input("n").as_deref(), Some("3"));

        let data = RequestData::new("POST", "/api/items/abc");
        let req = Request::new(HttpMethod::POST, data, action());
        assert_eq!(req.input("key").as_deref(), Some("path"));
        assert_eq!(req.input("page").as_deref(), Some("2"));
        assert_eq!(req.input("missing"), None);
    }

    #[test]
    fn test_form_params_are_last() {
        let data = RequestData::new("POST", "/api/items/abc").with_form("page=9&color=red");
        let req = Request::new(HttpMethod::POST, data, action());
        assert_eq!(req.input("page").as_deref(), Some("2"));
        assert_eq!(req.input("color").as_deref(), Some("red"));
    }

    #[test]
    fn test_json_body() {
        #[derive(serde::Deserialize)]
        struct Item {
            name: String,
        }
        let data = RequestData::new("POST", "/").with_json(json!({"name": "widget"}));
        let req = Request::new(HttpMethod::POST, data, action());
        let item: Item = req.json().unwrap();
        assert_eq!(item.name, "widget");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
    }
}
