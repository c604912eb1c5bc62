//! Demo application served by the bundled binaries.
//!
//! Registers the nested-route example plus a small API-key and token API.
//! Storage is an in-memory stand-in shared by every request of one process;
//! under the CGI binary it lives for exactly one request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchyard_core::{
    handler, ApiKeyMiddleware, BodySizeLimitMiddleware, Controller, CorsMiddleware, DispatchConfig,
    DispatchServer, Error, LoggingMiddleware, Middleware, Reply, Request, RequestIdMiddleware, Response,
};
use tokio::sync::RwLock;

/// A stored API key record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: String,
    pub label: String,
}

/// An issued bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub subject: String,
}

/// In-memory storage for keys and tokens.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<BTreeMap<String, KeyRecord>>,
    tokens: RwLock<BTreeMap<String, TokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_key(&self, label: &str) -> KeyRecord {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let record = KeyRecord {
            id: id.clone(),
            label: label.to_string(),
        };
        self.keys.write().await.insert(id, record.clone());
        record
    }

    pub async fn key(&self, id: &str) -> Option<KeyRecord> {
        self.keys.read().await.get(id).cloned()
    }

    pub async fn keys(&self) -> Vec<KeyRecord> {
        self.keys.read().await.values().cloned().collect()
    }

    pub async fn remove_key(&self, id: &str) -> Option<KeyRecord> {
        self.keys.write().await.remove(id)
    }

    pub async fn issue_token(&self, subject: &str) -> TokenRecord {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let record = TokenRecord {
            token: token.clone(),
            subject: subject.to_string(),
        };
        self.tokens.write().await.insert(token, record.clone());
        record
    }

    pub async fn token(&self, token: &str) -> Option<TokenRecord> {
        self.tokens.read().await.get(token).cloned()
    }
}

/// `admin::Keys`: CRUD over stored API keys
pub struct KeysController {
    store: Arc<MemoryStore>,
}

impl KeysController {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn missing(id: &str) -> Response {
        Response::not_found().with_json(json!({
            "error": format!("Key {} not found", id),
            "status": 404,
        }))
    }
}

#[async_trait]
impl Controller for KeysController {
    fn methods(&self) -> &[&'static str] {
        &["index", "show", "store", "destroy"]
    }

    async fn call(&self, method: &str, request: Request) -> Result<Reply, Error> {
        let response = match method {
            "index" => Response::ok().with_serialized(&self.store.keys().await)?,
            "show" => {
                let id = request.param("id").unwrap_or_default();
                match self.store.key(id).await {
                    Some(record) => Response::ok().with_serialized(&record)?,
                    None => Self::missing(id),
                }
            }
            "store" => {
                let label = request
                    .input("label")
                    .filter(|l| !l.trim().is_empty())
                    .ok_or_else(|| Error::http(422, "label is required"))?;
                let record = self.store.insert_key(&label).await;
                Response::created().with_serialized(&record)?
            }
            "destroy" => {
                let id = request.param("id").unwrap_or_default();
                match self.store.remove_key(id).await {
                    Some(_) => Response::no_content(),
                    None => Self::missing(id),
                }
            }
            other => return Err(Error::TargetNotFound(format!("admin::Keys@{}", other))),
        };
        Ok(response.into())
    }
}

/// `Tokens`: issues and introspects opaque bearer tokens
pub struct TokensController {
    store: Arc<MemoryStore>,
}

impl TokensController {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Controller for TokensController {
    fn methods(&self) -> &[&'static str] {
        &["issue", "introspect"]
    }

    async fn call(&self, method: &str, request: Request) -> Result<Reply, Error> {
        match method {
            "issue" => {
                let subject = request
                    .input("subject")
                    .ok_or_else(|| Error::http(422, "subject is required"))?;
                let record = self.store.issue_token(&subject).await;
                Ok(Response::created().with_serialized(&record)?.into())
            }
            "introspect" => {
                let token = request.param("token").unwrap_or_default();
                let active = self.store.token(token).await;
                Ok(Response::json(json!({
                    "active": active.is_some(),
                    "subject": active.map(|t| t.subject),
                }))
                .into())
            }
            other => Err(Error::TargetNotFound(format!("Tokens@{}", other))),
        }
    }
}

/// Everything the demo server needs besides the dispatch config
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub api_keys: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            api_keys: vec!["dev-key".to_string()],
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Build the demo dispatch server over `store`.
pub fn build_server(
    config: DispatchConfig,
    options: DemoOptions,
    store: Arc<MemoryStore>,
) -> Result<DispatchServer, Error> {
    let origin = config.allow_origin.clone();
    let api_keys = options.api_keys.clone();

    DispatchServer::builder()
        .config(config)
        .controller("admin::Keys", KeysController::new(store.clone()))
        .controller("Tokens", TokensController::new(store))
        .middleware("request-id", RequestIdMiddleware)
        .middleware("logging", LoggingMiddleware::new())
        .middleware("cors", CorsMiddleware::new().allow_origin(&origin))
        .middleware("body-limit", BodySizeLimitMiddleware::new(options.max_body_bytes))
        .middleware_factory("api-key", move || {
            if api_keys.is_empty() {
                return Err("no API keys configured".to_string());
            }
            let middleware: Arc<dyn Middleware> = Arc::new(ApiKeyMiddleware::new(api_keys.clone()));
            Ok(middleware)
        })
        .global("request-id")
        .global("logging")
        .global("cors")
        .routes(|r| {
            r.get("/", handler(|_req| async {
                Ok(json!({"name": "switchyard", "version": env!("CARGO_PKG_VERSION")}))
            }));

            r.prefix("lvl1").group(|r| {
                r.get("/hello", handler(|_req| async { Ok(json!({"message": "hello"})) }));
                r.prefix("lvl2").group(|r| {
                    r.get("/status", handler(|_req| async { Ok(json!({"status": "ok"})) }));
                });
                r.middleware("api-key")
                    .get("/test", handler(|req: Request| async move {
                        Ok(json!({"authenticated_with": req.attribute("api_key")}))
                    }));
            });
            r.get("/outside", handler(|_req| async { Ok("outside") }));

            r.namespace("admin")
                .controller("Keys")
                .prefix("keys")
                .middlewares(["api-key", "body-limit"])
                .group(|r| {
                    r.get("/", "index");
                    r.post("/", "store");
                    r.get("/{id}", "show");
                    r.delete("/{id}", "destroy");
                });

            r.controller("Tokens").prefix("tokens").group(|r| {
                r.middleware("body-limit").post("/", "issue");
                r.get("/{token}", "introspect");
            });
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_round_trip() {
        let store = MemoryStore::new();
        let key = store.insert_key("ci").await;
        assert_eq!(store.key(&key.id).await, Some(key.clone()));
        assert_eq!(store.keys().await.len(), 1);
        assert!(store.remove_key(&key.id).await.is_some());
        assert!(store.key(&key.id).await.is_none());

        let token = store.issue_token("ada").await;
        assert_eq!(store.token(&token.token).await.map(|t| t.subject), Some("ada".into()));
    }

    #[test]
    fn test_demo_routes_register() {
        let server = build_server(
            DispatchConfig::default(),
            DemoOptions::default(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let patterns: Vec<String> = server.routes().map(|e| e.pattern.clone()).collect();
        assert!(patterns.contains(&"/api/lvl1/lvl2/status".to_string()));
        assert!(patterns.contains(&"/api/keys/{id}".to_string()));
        assert_eq!(server.table().len(), 11);
    }
}
