//! Middleware pipeline
//!
//! A [`Pipeline`] collects middleware (as ready instances or as registry
//! identifiers) in declared order and a terminal handler. On `run`, every
//! identifier is resolved first, so an unknown or unconstructible
//! middleware fails before any code runs. The list is then folded from the
//! last entry to the first, each layer wrapping the chain built so far, so
//! the first declared middleware runs first.
//!
//! A middleware continues by calling `next`. Returning without calling it
//! short-circuits the remaining layers and the terminal handler.

use crate::route::BoxFuture;
use crate::{Error, Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Continuation to the rest of the chain
pub type Next = Box<dyn FnOnce(Request) -> BoxFuture<Result<Response, Error>> + Send>;

/// Middleware trait for processing requests before they reach the handler
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally pass to next middleware
    async fn handle(&self, req: Request, next: Next) -> Result<Response, Error>;
}

/// Builds a middleware unit on demand; an `Err` means the unit could not be constructed.
pub type MiddlewareFactory = Arc<dyn Fn() -> Result<Arc<dyn Middleware>, String> + Send + Sync>;

/// Middleware addressable by identifier from route declarations.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    factories: HashMap<String, MiddlewareFactory>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance under `id`.
    pub fn register<M: Middleware + 'static>(&mut self, id: impl Into<String>, middleware: M) {
        let instance: Arc<dyn Middleware> = Arc::new(middleware);
        self.factories
            .insert(id.into(), Arc::new(move || Ok(instance.clone())));
    }

    /// Register a factory invoked each time the identifier is resolved.
    pub fn register_factory<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Middleware>, String> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Middleware>, Error> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| Error::MiddlewareNotFound(id.to_string()))?;
        factory().map_err(|reason| {
            Error::MiddlewareContractViolation(format!("{}: {}", id, reason))
        })
    }
}

impl std::fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("MiddlewareRegistry").field("ids", &ids).finish()
    }
}

enum Layer {
    Instance(Arc<dyn Middleware>),
    Id(String),
}

/// Middleware chain around one terminal handler.
pub struct Pipeline {
    registry: Arc<MiddlewareRegistry>,
    layers: Vec<Layer>,
    terminal: Option<Next>,
}

impl Pipeline {
    pub fn new(registry: Arc<MiddlewareRegistry>) -> Self {
        Self {
            registry,
            layers: Vec::new(),
            terminal: None,
        }
    }

    /// Append an already constructed middleware
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.layers.push(Layer::Instance(middleware));
        self
    }

    /// Append middleware identifiers in declared order
    pub fn through<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers
            .extend(ids.into_iter().map(|id| Layer::Id(id.into())));
        self
    }

    /// Set the innermost call
    pub fn then<F>(mut self, terminal: F) -> Self
    where
        F: FnOnce(Request) -> BoxFuture<Result<Response, Error>> + Send + 'static,
    {
        self.terminal = Some(Box::new(terminal));
        self
    }

    pub async fn run(self, request: Request) -> Result<Response, Error> {
        let terminal = self
            .terminal
            .ok_or_else(|| Error::http(500, "pipeline has no terminal handler"))?;

        let mut resolved = Vec::with_capacity(self.layers.len());
        for layer in self.layers {
            resolved.push(match layer {
                Layer::Instance(middleware) => middleware,
                Layer::Id(id) => self.registry.resolve(&id)?,
            });
        }

        debug!(
            middleware_count = resolved.len(),
            uri = %request.uri(),
            method = %request.method,
            "Executing middleware chain"
        );

        let mut next: Next = terminal;
        for (index, middleware) in resolved.into_iter().enumerate().rev() {
            let inner = next;
            next = Box::new(move |req| {
                Box::pin(async move {
                    trace!(middleware_index = index, "Executing middleware");
                    middleware.handle(req, inner).await
                })
            });
        }
        next(request).await
    }
}
