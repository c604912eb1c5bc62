// HTTP request snapshots, responses and wire-level output

use crate::Error;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// HTTP methods understood by the dispatcher
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    GET,
    HEAD,
    OPTIONS,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::GET,
        HttpMethod::HEAD,
        HttpMethod::OPTIONS,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::PATCH,
        HttpMethod::DELETE,
    ];

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one inbound request, as handed over by an adapter.
///
/// Header names are stored lowercase. `uri` is the path only, already
/// percent-decoded; the query string travels separately.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    pub method: String,
    pub uri: String,
    pub raw_query: Option<String>,
    pub headers: HashMap<String, String>,
    pub parsed_body: Map<String, Value>,
    pub query_params: HashMap<String, String>,
    pub raw_body: Bytes,
}

impl RequestData {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Build a snapshot from raw adapter parts.
    ///
    /// Decodes the path and fills `parsed_body` when the body is a JSON
    /// object sent as `application/json`.
    pub fn from_raw(
        method: &str,
        path: &str,
        query: Option<&str>,
        headers: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        let uri = urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        let headers: HashMap<String, String> = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        let is_json = headers
            .get("content-type")
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let parsed_body = if is_json && !body.is_empty() {
            match serde_json::from_slice::<Value>(&body) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            }
        } else {
            Map::new()
        };

        Self {
            method: method.to_string(),
            uri,
            raw_query: query.filter(|q| !q.is_empty()).map(String::from),
            headers,
            parsed_body,
            query_params: HashMap::new(),
            raw_body: body,
        }
    }

    pub fn with_query(mut self, raw: impl Into<String>) -> Self {
        self.raw_query = Some(raw.into());
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Set a JSON body; non-object values are kept raw only.
    pub fn with_json(mut self, value: Value) -> Self {
        self.raw_body = Bytes::from(value.to_string());
        if let Value::Object(map) = value {
            self.parsed_body = map;
        }
        self.with_header("content-type", "application/json")
    }

    pub fn with_form(mut self, encoded: impl Into<String>) -> Self {
        self.raw_body = Bytes::from(encoded.into());
        self.with_header("content-type", "application/x-www-form-urlencoded")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Query parameters: the adapter-provided map, or the parsed raw query.
    pub fn effective_query(&self) -> HashMap<String, String> {
        if !self.query_params.is_empty() {
            return self.query_params.clone();
        }
        self.raw_query
            .as_deref()
            .map(parse_urlencoded)
            .unwrap_or_default()
    }

    /// Form-encoded body parameters, empty unless the content type says so.
    pub fn form_params(&self) -> HashMap<String, String> {
        let is_form = self
            .header("content-type")
            .map(|ct| ct.contains("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if !is_form || self.raw_body.is_empty() {
            return HashMap::new();
        }
        std::str::from_utf8(&self.raw_body)
            .map(parse_urlencoded)
            .unwrap_or_default()
    }
}

/// Parse `a=1&b=2`; the last occurrence of a repeated key wins.
pub fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(input)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

/// Response payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Json(Value),
}

/// Response built by handlers and middleware
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub data: Body,
    pub headers: HashMap<String, String>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            data: Body::Empty,
            headers: HashMap::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn unauthorized() -> Self {
        Self::new(401)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// `200` with a JSON body
    pub fn json(value: Value) -> Self {
        Self::ok().with_json(value)
    }

    /// `200` with a plain-text body
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok()
            .with_body(Bytes::from(text.into()))
            .with_header("Content-Type", "text/plain; charset=utf-8")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_json(mut self, value: Value) -> Self {
        self.data = Body::Json(value);
        self
    }

    /// Serialize any value into the JSON payload.
    pub fn with_serialized<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self.with_json(value))
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.data = Body::Bytes(body.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a handler hands back before it is turned into a [`Response`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response(Response),
    Data(Value),
    Text(String),
    Empty,
}

impl Reply {
    /// Wrap loose data: JSON as `200`, text as `200 text/plain`, nothing as `204`.
    pub fn into_response(self) -> Response {
        match self {
            Reply::Response(response) => response,
            Reply::Data(value) => Response::json(value),
            Reply::Text(text) => Response::text(text),
            Reply::Empty => Response::no_content(),
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Reply::Response(_))
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Data(value)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&'static str> for Reply {
    fn from(text: &'static str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

/// Rendered response, ready for an adapter to write out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl WireResponse {
    /// Serialize a [`Response`]; JSON payloads get a JSON content type unless one is set.
    pub fn from_response(response: Response) -> Result<Self, Error> {
        let mut headers: BTreeMap<String, String> = response.headers.into_iter().collect();
        let body = match response.data {
            Body::Empty => Bytes::new(),
            Body::Bytes(bytes) => bytes,
            Body::Json(value) => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert("Content-Type".to_string(), "application/json".to_string());
                }
                Bytes::from(
                    serde_json::to_vec(&value).map_err(|e| Error::Serialization(e.to_string()))?,
                )
            }
        };
        Ok(Self {
            status: response.status,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_round_trip() {
        for method in HttpMethod::ALL {
            assert_eq!(HttpMethod::from_str(method.as_str()), Some(method));
        }
        assert_eq!(HttpMethod::from_str("get"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::from_str("TRACE"), None);
    }

    #[test]
    fn test_from_raw_decodes_path_and_json_body() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let data = RequestData::from_raw(
            "POST",
            "/api/users/john%20doe",
            Some("page=2"),
            headers,
            Bytes::from_static(br#"{"name":"john"}"#),
        );

        assert_eq!(data.uri, "/api/users/john doe");
        assert_eq!(data.raw_query.as_deref(), Some("page=2"));
        assert_eq!(data.header("Content-Type"), Some("application/json"));
        assert_eq!(data.parsed_body.get("name"), Some(&json!("john")));
    }

    #[test]
    fn test_effective_query_prefers_explicit_params() {
        let data = RequestData::new("GET", "/").with_query("a=1&b=two");
        let query = data.effective_query();
        assert_eq!(query.get("a").map(String::as_str), Some("1"));
        assert_eq!(query.get("b").map(String::as_str), Some("two"));

        let data = RequestData::new("GET", "/")
            .with_query("a=1")
            .with_query_param("a", "explicit");
        assert_eq!(
            data.effective_query().get("a").map(String::as_str),
            Some("explicit")
        );
    }

    #[test]
    fn test_form_params_require_form_content_type() {
        let data = RequestData::new("POST", "/").with_form("name=jane&age=30");
        assert_eq!(
            data.form_params().get("name").map(String::as_str),
            Some("jane")
        );

        let mut data = RequestData::new("POST", "/");
        data.raw_body = Bytes::from_static(b"name=jane");
        assert!(data.form_params().is_empty());
    }

    #[test]
    fn test_reply_wrapping() {
        assert_eq!(Reply::from(json!({"a": 1})).into_response().status, 200);
        assert_eq!(Reply::from(()).into_response().status, 204);
        let text = Reply::from("hi").into_response();
        assert_eq!(text.header("content-type"), Some("text/plain; charset=utf-8"));
        assert!(Reply::from(Response::created()).is_response());
    }

    #[test]
    fn test_wire_response_sets_json_content_type() {
        let wire = WireResponse::from_response(Response::json(json!({"ok": true}))).unwrap();
        assert_eq!(wire.status, 200);
        assert_eq!(wire.header("content-type"), Some("application/json"));
        assert_eq!(wire.json(), Some(json!({"ok": true})));

        let wire = WireResponse::from_response(
            Response::ok()
                .with_header("Content-Type", "application/vnd.api+json")
                .with_json(json!([])),
        )
        .unwrap();
        assert_eq!(wire.header("content-type"), Some("application/vnd.api+json"));
    }
}
