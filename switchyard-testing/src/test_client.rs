// In-process test client

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::{DispatchServer, Error, HttpMethod, RequestData, WireResponse};

/// Sends requests straight to [`DispatchServer::dispatch_once`], no socket involved.
#[derive(Clone)]
pub struct TestClient {
    server: Arc<DispatchServer>,
}

impl TestClient {
    pub fn new(server: DispatchServer) -> Self {
        Self::from_arc(Arc::new(server))
    }

    pub fn from_arc(server: Arc<DispatchServer>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &DispatchServer {
        &self.server
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::GET, path)).await
    }

    pub async fn head(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::HEAD, path)).await
    }

    pub async fn options(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::OPTIONS, path)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::DELETE, path)).await
    }

    /// POST a JSON body
    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, path).json(body))
            .await
    }

    pub async fn put_json(&self, path: &str, body: serde_json::Value) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::PUT, path).json(body))
            .await
    }

    pub async fn patch_json(&self, path: &str, body: serde_json::Value) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::PATCH, path).json(body))
            .await
    }

    /// Start a request with any method name, including ones the server does not implement
    pub fn request(&self, method: &str, path: &str) -> TestRequestBuilder {
        TestRequestBuilder::with_method_name(method, path)
    }

    pub async fn send(&self, builder: TestRequestBuilder) -> TestResponse {
        TestResponse::new(self.server.dispatch_once(builder.build()).await)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Bytes,
    query_params: Vec<(String, String)>,
}

impl TestRequestBuilder {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self::with_method_name(method.as_str(), path)
    }

    pub fn with_method_name(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: HashMap::new(),
            body: Bytes::new(),
            query_params: Vec::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.body = Bytes::from(data.to_string());
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        self
    }

    /// Serialize any value as the JSON body
    pub fn json_from<T: serde::Serialize>(self, data: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(data).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self.json(value))
    }

    /// Form-encode `pairs` as the body
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Result<Self, Error> {
        let encoded =
            serde_urlencoded::to_string(pairs).map_err(|e| Error::Serialization(e.to_string()))?;
        self.body = Bytes::from(encoded);
        self.headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.push((key.to_string(), value.to_string()));
        self
    }

    /// Build the snapshot the way a network adapter would
    pub fn build(self) -> RequestData {
        let (path, inline_query) = match self.path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (self.path, None),
        };
        let extra = serde_urlencoded::to_string(&self.query_params).unwrap_or_default();
        let query = match (inline_query, extra.is_empty()) {
            (Some(inline), true) => Some(inline),
            (Some(inline), false) => Some(format!("{}&{}", inline, extra)),
            (None, false) => Some(extra),
            (None, true) => None,
        };
        RequestData::from_raw(&self.method, &path, query.as_deref(), self.headers, self.body)
    }
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse {
    wire: WireResponse,
}

impl TestResponse {
    pub fn new(wire: WireResponse) -> Self {
        Self { wire }
    }

    pub fn status(&self) -> u16 {
        self.wire.status
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.wire.header(key)
    }

    pub fn body(&self) -> &Bytes {
        &self.wire.body
    }

    pub fn body_string(&self) -> Option<String> {
        self.wire.body_str().map(String::from)
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_slice(&self.wire.body).map_err(|e| format!("Deserialization error: {}", e))
    }

    /// The `error` field of a rendered error body
    pub fn error_message(&self) -> Option<String> {
        self.wire
            .json()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
    }

    pub fn into_wire(self) -> WireResponse {
        self.wire
    }
}
