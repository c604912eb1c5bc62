//! Dispatch server: the boundary between adapters and the routing core.
//!
//! A [`DispatchServer`] is built once and is read-only afterwards. It serves
//! requests in two modes:
//!
//! - [`DispatchServer::dispatch_once`] answers a single [`RequestData`]
//!   snapshot, for one-request-per-process adapters.
//! - [`DispatchServer::dispatch_loop`] pulls [`Exchange`]s from an
//!   [`EventSource`] until it closes, answering each on its reply channel.
//!
//! Both paths run the same sequence: resolve, run the pipeline, render.
//! Every error is rendered as `{"error": ..., "status": ...}`.

use crate::pipeline::{MiddlewareRegistry, Pipeline};
use crate::route::BoxFuture;
use crate::{
    Controller, ControllerRegistry, DispatchConfig, Error, HttpMethod, Middleware, Reply, Request,
    RequestData, Resolver, Response, RouteEntry, RouteTable, Routes, Target, WireResponse,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// One request travelling from an adapter to the dispatch loop, with the
/// channel its response goes back on.
#[derive(Debug)]
pub struct Exchange {
    pub request: RequestData,
    pub reply: oneshot::Sender<WireResponse>,
}

impl Exchange {
    pub fn new(request: RequestData) -> (Self, oneshot::Receiver<WireResponse>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply }, rx)
    }
}

/// Source of exchanges for the stateful loop. `None` means closed.
#[async_trait]
pub trait EventSource: Send {
    async fn next_exchange(&mut self) -> Option<Exchange>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<Exchange> {
    async fn next_exchange(&mut self) -> Option<Exchange> {
        self.recv().await
    }
}

#[async_trait]
impl EventSource for mpsc::UnboundedReceiver<Exchange> {
    async fn next_exchange(&mut self) -> Option<Exchange> {
        self.recv().await
    }
}

type Declaration = Box<dyn FnOnce(&mut Routes<'_>)>;

/// Collects routes, controllers, middleware and config for a [`DispatchServer`].
#[derive(Default)]
pub struct DispatchServerBuilder {
    config: DispatchConfig,
    controllers: ControllerRegistry,
    middleware: MiddlewareRegistry,
    global: Vec<String>,
    declarations: Vec<Declaration>,
}

impl DispatchServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn controller<C: Controller>(mut self, class: &str, controller: C) -> Self {
        self.controllers.register(class, controller);
        self
    }

    /// Register a middleware instance under `id`
    pub fn middleware<M: Middleware + 'static>(mut self, id: &str, middleware: M) -> Self {
        self.middleware.register(id, middleware);
        self
    }

    pub fn middleware_factory<F>(mut self, id: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Middleware>, String> + Send + Sync + 'static,
    {
        self.middleware.register_factory(id, factory);
        self
    }

    /// Run middleware `id` on every request, before route middleware
    pub fn global(mut self, id: &str) -> Self {
        self.global.push(id.to_string());
        self
    }

    /// Queue route declarations; they run at `build` once every controller is known.
    pub fn routes<F>(mut self, declare: F) -> Self
    where
        F: FnOnce(&mut Routes<'_>) + 'static,
    {
        self.declarations.push(Box::new(declare));
        self
    }

    pub fn build(self) -> Result<DispatchServer, Error> {
        let DispatchServerBuilder {
            config,
            controllers,
            middleware,
            global,
            declarations,
        } = self;

        let mut routes = Routes::new(config.root_prefix.clone(), &controllers);
        for declare in declarations {
            declare(&mut routes);
        }
        let table = routes.finish()?;

        info!(
            routes = table.len(),
            controllers = controllers.len(),
            global_middleware = global.len(),
            root_prefix = %config.root_prefix,
            "Dispatch server built"
        );

        Ok(DispatchServer {
            table,
            controllers: Arc::new(controllers),
            middleware: Arc::new(middleware),
            global,
            config,
        })
    }
}

/// Owns the route table and answers requests against it.
pub struct DispatchServer {
    table: RouteTable,
    controllers: Arc<ControllerRegistry>,
    middleware: Arc<MiddlewareRegistry>,
    global: Vec<String>,
    config: DispatchConfig,
}

impl DispatchServer {
    pub fn builder() -> DispatchServerBuilder {
        DispatchServerBuilder::new()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Registered routes, method order then registration order
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.table.iter()
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.table, &self.controllers)
    }

    /// Resolve, run and render a single request.
    ///
    /// Methods outside [`HttpMethod::ALL`] render `501`. A known method with no
    /// routes registered renders `404` like any other routing failure, so
    /// clients cannot tell an empty method table from an unmatched path.
    /// HEAD and OPTIONS responses never carry a body, errors included.
    pub async fn dispatch_once(&self, data: RequestData) -> WireResponse {
        debug!(method = %data.method, uri = %data.uri, "Dispatching request");

        let Some(method) = HttpMethod::from_str(&data.method) else {
            let err = Error::http(501, format!("Method {} is not implemented", data.method));
            return self.render_error(&err, false);
        };

        let result = self.handle(method, data).await;
        let bodiless = matches!(method, HttpMethod::HEAD | HttpMethod::OPTIONS);
        match result {
            Ok(response) => self.render(response, bodiless),
            Err(err) => self.render_error(&err, bodiless),
        }
    }

    /// Serve exchanges one at a time until the source closes; returns how many were served.
    pub async fn dispatch_loop<S: EventSource>(&self, mut source: S) -> usize {
        let mut served = 0usize;
        while let Some(Exchange { request, reply }) = source.next_exchange().await {
            let response = self.dispatch_once(request).await;
            if reply.send(response).is_err() {
                debug!("Reply channel closed before the response was sent");
            }
            served += 1;
        }
        info!(served, "Event source closed");
        served
    }

    async fn handle(&self, method: HttpMethod, data: RequestData) -> Result<Response, Error> {
        let query = data.effective_query();
        let action = self.resolver().resolve(method, &data.uri, &query)?;

        if method == HttpMethod::OPTIONS {
            debug!(uri = %action.uri, pattern = %action.route.pattern, "Answering preflight");
            return Ok(self.options_response());
        }

        let ids: Vec<String> = self
            .global
            .iter()
            .chain(action.middleware.iter())
            .cloned()
            .collect();
        let target = action.target.clone();
        let controllers = self.controllers.clone();
        let request = Request::new(method, data, action);

        Pipeline::new(self.middleware.clone())
            .through(ids)
            .then(move |req| invoke_target(controllers, target, req))
            .run(request)
            .await
    }

    fn options_response(&self) -> Response {
        self.config
            .options_headers()
            .into_iter()
            .fold(Response::no_content(), |response, (key, value)| {
                response.with_header(key, value)
            })
    }

    fn render(&self, response: Response, bodiless: bool) -> WireResponse {
        match WireResponse::from_response(response) {
            Ok(mut wire) => {
                if bodiless {
                    wire.body = Bytes::new();
                }
                wire
            }
            Err(err) => self.render_error(&err, bodiless),
        }
    }

    fn render_error(&self, err: &Error, bodiless: bool) -> WireResponse {
        let status = err.status_code();
        if status >= 500 {
            warn!(status, kind = %err.kind(), error = %err, "Request failed");
        } else {
            debug!(status, kind = %err.kind(), error = %err, "Request rejected");
        }

        let message = if status >= 500 && !self.config.debug {
            "Internal Server Error".to_string()
        } else {
            err.to_string()
        };
        let mut body = serde_json::json!({
            "error": message,
            "status": status,
        });
        if self.config.debug {
            body["kind"] = serde_json::Value::from(err.kind().as_str());
        }

        let mut wire = WireResponse {
            status,
            body: Bytes::from(body.to_string()),
            ..Default::default()
        };
        wire.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        if bodiless {
            wire.body = Bytes::new();
        }
        wire
    }
}

impl std::fmt::Debug for DispatchServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchServer")
            .field("routes", &self.table.len())
            .field("controllers", &self.controllers)
            .field("middleware", &self.middleware)
            .field("global", &self.global)
            .field("config", &self.config)
            .finish()
    }
}

/// Call the route target; controllers must answer with a full response.
fn invoke_target(
    controllers: Arc<ControllerRegistry>,
    target: Target,
    request: Request,
) -> BoxFuture<Result<Response, Error>> {
    Box::pin(async move {
        match target {
            Target::Closure(handler) => handler(request).await.map(Reply::into_response),
            Target::ControllerMethod { class, method } => {
                let controller = controllers.resolve(&class, &method)?;
                match controller.call(&method, request).await? {
                    Reply::Response(response) => Ok(response),
                    other => Err(Error::ControllerContractViolation(format!(
                        "{}@{} returned {} instead of a response",
                        class,
                        method,
                        reply_kind(&other)
                    ))),
                }
            }
        }
    })
}

fn reply_kind(reply: &Reply) -> &'static str {
    match reply {
        Reply::Response(_) => "a response",
        Reply::Data(_) => "data",
        Reply::Text(_) => "text",
        Reply::Empty => "nothing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::handler;
    use serde_json::json;

    struct Accounts;

    #[async_trait]
    impl Controller for Accounts {
        fn methods(&self) -> &[&'static str] {
            &["show", "broken"]
        }

        async fn call(&self, method: &str, request: Request) -> Result<Reply, Error> {
            match method {
                "show" => Ok(Response::json(json!({"id": request.param("id")})).into()),
                _ => Ok(Reply::Text("not a response".into())),
            }
        }
    }

    fn server(debug: bool) -> DispatchServer {
        DispatchServer::builder()
            .config(DispatchConfig::default().with_debug(debug))
            .controller("Accounts", Accounts)
            .routes(|r| {
                r.get("/ping", handler(|_req| async { Ok(json!({"pong": true})) }));
                r.post("/echo", handler(|req: Request| async move {
                    Ok(Response::created().with_json(json!({"name": req.input("name")})))
                }));
                r.controller("Accounts").group(|r| {
                    r.get("/accounts/{id}", "show");
                    r.get("/broken", "broken");
                });
                r.get("/fail", handler(|_req| async {
                    Err::<Reply, _>(Error::http(503, "backend unavailable"))
                }));
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_closure_data_renders_as_json() {
        let wire = server(false)
            .dispatch_once(RequestData::new("GET", "/api/ping/"))
            .await;
        assert_eq!(wire.status, 200);
        assert_eq!(wire.json(), Some(json!({"pong": true})));
        assert_eq!(wire.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_controller_route() {
        let wire = server(false)
            .dispatch_once(RequestData::new("GET", "/api/accounts/17"))
            .await;
        assert_eq!(wire.status, 200);
        assert_eq!(wire.json(), Some(json!({"id": "17"})));
    }

    #[tokio::test]
    async fn test_controller_contract_violation_is_500() {
        let wire = server(true)
            .dispatch_once(RequestData::new("GET", "/api/broken"))
            .await;
        assert_eq!(wire.status, 500);
        let body = wire.json().unwrap();
        assert_eq!(body["kind"], json!("controller_contract_violation"));
    }

    #[tokio::test]
    async fn test_server_error_message_hidden_without_debug() {
        let wire = server(false)
            .dispatch_once(RequestData::new("GET", "/api/fail"))
            .await;
        assert_eq!(wire.status, 503);
        assert_eq!(
            wire.json(),
            Some(json!({"error": "Internal Server Error", "status": 503}))
        );

        let wire = server(true)
            .dispatch_once(RequestData::new("GET", "/api/fail"))
            .await;
        assert_eq!(wire.json().unwrap()["error"], json!("backend unavailable"));
    }

    #[tokio::test]
    async fn test_routing_errors_render_404() {
        let server = server(false);
        let wire = server.dispatch_once(RequestData::new("GET", "/api/nowhere")).await;
        assert_eq!(wire.status, 404);
        assert_eq!(wire.json().unwrap()["status"], json!(404));

        // no DELETE routes at all: still 404, not 501
        let wire = self::server(true).dispatch_once(RequestData::new("DELETE", "/api/ping")).await;
        assert_eq!(wire.status, 404);
        assert_eq!(wire.json().unwrap()["kind"], json!("no_routes_for_method"));

        let wire = server.dispatch_once(RequestData::new("GET", "/api/accounts/a-b")).await;
        assert_eq!(wire.status, 404);
    }

    #[tokio::test]
    async fn test_unknown_method_is_501() {
        let wire = server(false)
            .dispatch_once(RequestData::new("TRACE", "/api/ping"))
            .await;
        assert_eq!(wire.status, 501);
    }

    #[tokio::test]
    async fn test_head_has_empty_body() {
        let wire = server(false)
            .dispatch_once(RequestData::new("HEAD", "/api/ping"))
            .await;
        assert_eq!(wire.status, 200);
        assert!(wire.body.is_empty());
    }

    #[tokio::test]
    async fn test_options_is_fixed_204() {
        let wire = server(false)
            .dispatch_once(RequestData::new("OPTIONS", "/api/echo"))
            .await;
        assert_eq!(wire.status, 204);
        assert!(wire.body.is_empty());
        assert_eq!(wire.header("allow"), Some("GET, POST, PUT, PATCH, DELETE, OPTIONS"));
        assert_eq!(wire.header("access-control-allow-origin"), Some("*"));

        let wire = server(false)
            .dispatch_once(RequestData::new("OPTIONS", "/api/nowhere"))
            .await;
        assert_eq!(wire.status, 404);
        assert!(wire.body.is_empty());
    }

    #[tokio::test]
    async fn test_post_reads_body() {
        let data = RequestData::new("POST", "/api/echo").with_json(json!({"name": "ada"}));
        let wire = server(false).dispatch_once(data).await;
        assert_eq!(wire.status, 201);
        assert_eq!(wire.json(), Some(json!({"name": "ada"})));
    }

    #[tokio::test]
    async fn test_unknown_controller_fails_build() {
        let err = DispatchServer::builder()
            .routes(|r| {
                r.get("/x", "Missing@index");
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn test_dispatch_loop_serves_until_closed() {
        let server = server(false);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut replies = Vec::new();
        for uri in ["/api/ping", "/api/nowhere", "/api/accounts/3"] {
            let (exchange, reply) = Exchange::new(RequestData::new("GET", uri));
            tx.send(exchange).unwrap();
            replies.push(reply);
        }
        drop(tx);

        assert_eq!(server.dispatch_loop(rx).await, 3);
        let statuses: Vec<u16> = {
            let mut statuses = Vec::new();
            for reply in replies {
                statuses.push(reply.await.unwrap().status);
            }
            statuses
        };
        assert_eq!(statuses, vec![200, 404, 200]);
    }
}
