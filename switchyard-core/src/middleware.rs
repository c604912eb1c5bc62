// Built-in middleware

use crate::pipeline::{Middleware, Next};
use crate::{Error, Request, Response};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Adds `Access-Control-Allow-Origin` to every response.
///
/// Preflight `OPTIONS` requests are answered by the dispatcher itself and
/// never reach this middleware.
pub struct CorsMiddleware {
    pub allow_origin: String,
    pub allow_credentials: bool,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_credentials: false,
        }
    }

    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.allow_origin = origin.to_string();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle(&self, req: Request, next: Next) -> Result<Response, Error> {
        let mut response = next(req).await?;
        response.headers.insert(
            "Access-Control-Allow-Origin".to_string(),
            self.allow_origin.clone(),
        );
        if self.allow_credentials {
            response.headers.insert(
                "Access-Control-Allow-Credentials".to_string(),
                "true".to_string(),
            );
        }
        Ok(response)
    }
}

/// Emits one structured event per request and one per outcome.
#[derive(Default)]
pub struct LoggingMiddleware {
    pub log_body: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self { log_body: false }
    }

    pub fn with_body(mut self) -> Self {
        self.log_body = true;
        self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, req: Request, next: Next) -> Result<Response, Error> {
        let start = Instant::now();
        let method = req.method;
        let uri = req.uri().to_string();

        if self.log_body && !req.raw_body.is_empty() {
            info!(%method, %uri, body_bytes = req.raw_body.len(), "Request received");
        } else {
            info!(%method, %uri, "Request received");
        }

        let result = next(req).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => {
                info!(%method, %uri, status = response.status, elapsed_ms, "Request completed")
            }
            Err(e) => {
                warn!(%method, %uri, error = %e, elapsed_ms, "Request failed")
            }
        }
        result
    }
}

/// Propagates `x-request-id`, generating one when the client sent none.
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut req: Request, next: Next) -> Result<Response, Error> {
        let request_id = req
            .header("x-request-id")
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        req.headers
            .insert("x-request-id".to_string(), request_id.clone());
        req.attributes
            .insert("request_id".to_string(), request_id.clone());

        let mut response = next(req).await?;
        response
            .headers
            .insert("x-request-id".to_string(), request_id);
        Ok(response)
    }
}

/// Rejects bodies larger than `max_size` bytes with `413`.
pub struct BodySizeLimitMiddleware {
    max_size: usize,
}

impl BodySizeLimitMiddleware {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

#[async_trait]
impl Middleware for BodySizeLimitMiddleware {
    async fn handle(&self, req: Request, next: Next) -> Result<Response, Error> {
        if req.raw_body.len() > self.max_size {
            return Err(Error::http(
                413,
                format!("Request body exceeds maximum size of {} bytes", self.max_size),
            ));
        }
        next(req).await
    }
}

/// Checks a request header against a set of accepted keys.
///
/// A missing or unknown key short-circuits with `401`; the handler is not
/// invoked. On success the key is exposed as the `api_key` attribute.
pub struct ApiKeyMiddleware {
    header: String,
    keys: HashSet<String>,
}

impl ApiKeyMiddleware {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: "x-api-key".to_string(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn header(mut self, name: &str) -> Self {
        self.header = name.to_ascii_lowercase();
        self
    }
}

#[async_trait]
impl Middleware for ApiKeyMiddleware {
    async fn handle(&self, mut req: Request, next: Next) -> Result<Response, Error> {
        let key = match req.header(&self.header) {
            Some(key) if self.keys.contains(key) => key.to_string(),
            Some(_) => {
                debug!(header = %self.header, "Rejected unknown API key");
                return Ok(unauthorized("invalid API key"));
            }
            None => {
                debug!(header = %self.header, "Rejected request without API key");
                return Ok(unauthorized("missing API key"));
            }
        };
        req.attributes.insert("api_key".to_string(), key);
        next(req).await
    }
}

fn unauthorized(message: &str) -> Response {
    Response::unauthorized().with_json(serde_json::json!({
        "error": message,
        "status": 401,
    }))
}
