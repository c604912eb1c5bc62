//! Route declaration DSL with nested grouping
//!
//! Routes are declared against a [`Routes`] handle. Grouping calls push a
//! [`ContextFrame`] for the duration of the group body, so nested groups
//! compose:
//!
//! ```
//! use switchyard_core::{handler, ControllerRegistry, Routes};
//!
//! let controllers = ControllerRegistry::new();
//! let mut routes = Routes::new("/api", &controllers);
//!
//! routes.prefix("v1").middleware("auth").group(|r| {
//!     r.get("/users", handler(|_req| async { Ok("users") }));
//!     r.prefix("admin").group(|r| {
//!         r.get("/stats", handler(|_req| async { Ok("stats") }));
//!     });
//! });
//!
//! let table = routes.finish().unwrap();
//! let patterns: Vec<_> = table.iter().map(|e| e.pattern.clone()).collect();
//! assert_eq!(patterns, vec!["/api/v1/users", "/api/v1/admin/stats"]);
//! ```
//!
//! Prefixes concatenate outer to inner after the root prefix. Namespace,
//! controller and middleware come from the nearest frame that sets them.

use crate::route::{handler_fn, join_path};
use crate::{ControllerRegistry, Error, HandlerFn, HttpMethod, Reply, Request, RouteEntry, RouteTable, Target};
use std::future::Future;
use tracing::{debug, warn};

/// A route target as written in declaration code, before context is applied.
#[derive(Clone)]
pub enum TargetSpec {
    Closure(HandlerFn),
    /// `class` is `None` when only a method name was given and the
    /// controller comes from the enclosing group.
    Controller {
        class: Option<String>,
        method: String,
    },
}

impl From<&str> for TargetSpec {
    /// `"Class@method"` or a bare `"method"`
    fn from(spec: &str) -> Self {
        match spec.split_once('@') {
            Some((class, method)) => TargetSpec::Controller {
                class: Some(class.to_string()),
                method: method.to_string(),
            },
            None => TargetSpec::Controller {
                class: None,
                method: spec.to_string(),
            },
        }
    }
}

impl From<String> for TargetSpec {
    fn from(spec: String) -> Self {
        TargetSpec::from(spec.as_str())
    }
}

impl From<HandlerFn> for TargetSpec {
    fn from(handler: HandlerFn) -> Self {
        TargetSpec::Closure(handler)
    }
}

impl From<Target> for TargetSpec {
    fn from(target: Target) -> Self {
        match target {
            Target::Closure(handler) => TargetSpec::Closure(handler),
            Target::ControllerMethod { class, method } => TargetSpec::Controller {
                class: Some(class),
                method,
            },
        }
    }
}

/// Use an async closure or fn as a route target.
pub fn handler<F, Fut, R>(f: F) -> TargetSpec
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: Into<Reply>,
{
    TargetSpec::Closure(handler_fn(f))
}

/// One level of grouping. Unset fields inherit from enclosing frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextFrame {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub controller: Option<String>,
    pub middleware: Option<Vec<String>>,
}

/// Registration handle: owns the table being built and the context stack.
pub struct Routes<'c> {
    table: RouteTable,
    controllers: &'c ControllerRegistry,
    root_prefix: String,
    stack: Vec<ContextFrame>,
    errors: Vec<Error>,
}

impl<'c> Routes<'c> {
    pub fn new(root_prefix: impl Into<String>, controllers: &'c ControllerRegistry) -> Self {
        Self {
            table: RouteTable::new(),
            controllers,
            root_prefix: root_prefix.into(),
            stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn get(&mut self, path: &str, target: impl Into<TargetSpec>) -> &mut Self {
        self.add(HttpMethod::GET, path, target.into());
        self
    }

    pub fn post(&mut self, path: &str, target: impl Into<TargetSpec>) -> &mut Self {
        self.add(HttpMethod::POST, path, target.into());
        self
    }

    pub fn put(&mut self, path: &str, target: impl Into<TargetSpec>) -> &mut Self {
        self.add(HttpMethod::PUT, path, target.into());
        self
    }

    pub fn patch(&mut self, path: &str, target: impl Into<TargetSpec>) -> &mut Self {
        self.add(HttpMethod::PATCH, path, target.into());
        self
    }

    pub fn delete(&mut self, path: &str, target: impl Into<TargetSpec>) -> &mut Self {
        self.add(HttpMethod::DELETE, path, target.into());
        self
    }

    pub fn prefix(&mut self, prefix: &str) -> GroupBuilder<'_, 'c> {
        GroupBuilder::new(self).prefix(prefix)
    }

    pub fn namespace(&mut self, namespace: &str) -> GroupBuilder<'_, 'c> {
        GroupBuilder::new(self).namespace(namespace)
    }

    pub fn controller(&mut self, class: &str) -> GroupBuilder<'_, 'c> {
        GroupBuilder::new(self).controller(class)
    }

    pub fn middleware(&mut self, id: &str) -> GroupBuilder<'_, 'c> {
        GroupBuilder::new(self).middleware(id)
    }

    pub fn middlewares<I, S>(&mut self, ids: I) -> GroupBuilder<'_, 'c>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupBuilder::new(self).middlewares(ids)
    }

    /// Number of active group frames
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Hand over the table, or the first registration failure.
    pub fn finish(self) -> Result<RouteTable, Error> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.table),
        }
    }

    fn add(&mut self, method: HttpMethod, path: &str, spec: TargetSpec) {
        let mut parts: Vec<&str> = vec![self.root_prefix.as_str()];
        parts.extend(self.stack.iter().filter_map(|f| f.prefix.as_deref()));
        parts.push(path);
        let pattern = join_path(parts);

        let namespace = self.stack.iter().rev().find_map(|f| f.namespace.clone());
        let controller = self.stack.iter().rev().find_map(|f| f.controller.clone());
        let middleware = self
            .stack
            .iter()
            .rev()
            .find_map(|f| f.middleware.clone())
            .unwrap_or_default();

        let target = match self.materialize(spec, namespace.as_deref(), controller.as_deref()) {
            Ok(target) => target,
            Err(err) => {
                warn!(method = %method, pattern = %pattern, error = %err, "Route rejected");
                self.errors.push(err);
                return;
            }
        };

        debug!(
            method = %method,
            pattern = %pattern,
            target = ?target,
            middleware = ?middleware,
            "Registering route"
        );
        let entry = RouteEntry::new(method, pattern, target)
            .with_middleware(middleware)
            .with_namespace(namespace);
        self.table.register(entry);
    }

    fn materialize(
        &self,
        spec: TargetSpec,
        namespace: Option<&str>,
        controller: Option<&str>,
    ) -> Result<Target, Error> {
        match spec {
            TargetSpec::Closure(handler) => Ok(Target::Closure(handler)),
            TargetSpec::Controller { class, method } => {
                let class = class.as_deref().or(controller).ok_or_else(|| {
                    Error::TargetNotFound(format!("no controller in scope for method {}", method))
                })?;
                let class = qualify(namespace, class);
                self.controllers.resolve(&class, &method)?;
                Ok(Target::ControllerMethod { class, method })
            }
        }
    }
}

/// Prepend the namespace unless the class is already qualified.
fn qualify(namespace: Option<&str>, class: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !class.contains("::") => format!("{}::{}", ns, class),
        _ => class.to_string(),
    }
}

/// Pending context frame, applied by [`GroupBuilder::group`] or to a single route.
pub struct GroupBuilder<'r, 'c> {
    routes: &'r mut Routes<'c>,
    frame: ContextFrame,
}

impl<'r, 'c> GroupBuilder<'r, 'c> {
    fn new(routes: &'r mut Routes<'c>) -> Self {
        Self {
            routes,
            frame: ContextFrame::default(),
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        let joined = match self.frame.prefix.take() {
            Some(existing) => join_path([existing.as_str(), prefix]),
            None => join_path([prefix]),
        };
        self.frame.prefix = Some(joined);
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.frame.namespace = Some(namespace.to_string());
        self
    }

    pub fn controller(mut self, class: &str) -> Self {
        self.frame.controller = Some(class.to_string());
        self
    }

    pub fn middleware(mut self, id: &str) -> Self {
        self.frame
            .middleware
            .get_or_insert_with(Vec::new)
            .push(id.to_string());
        self
    }

    pub fn middlewares<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frame
            .middleware
            .get_or_insert_with(Vec::new)
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Run `body` with this frame pushed; the frame is popped afterwards.
    pub fn group<F>(self, body: F)
    where
        F: FnOnce(&mut Routes<'c>),
    {
        let GroupBuilder { routes, frame } = self;
        routes.stack.push(frame);
        body(&mut *routes);
        routes.stack.pop();
    }

    pub fn get(self, path: &str, target: impl Into<TargetSpec>) {
        self.single(HttpMethod::GET, path, target.into());
    }

    pub fn post(self, path: &str, target: impl Into<TargetSpec>) {
        self.single(HttpMethod::POST, path, target.into());
    }

    pub fn put(self, path: &str, target: impl Into<TargetSpec>) {
        self.single(HttpMethod::PUT, path, target.into());
    }

    pub fn patch(self, path: &str, target: impl Into<TargetSpec>) {
        self.single(HttpMethod::PATCH, path, target.into());
    }

    pub fn delete(self, path: &str, target: impl Into<TargetSpec>) {
        self.single(HttpMethod::DELETE, path, target.into());
    }

    fn single(self, method: HttpMethod, path: &str, spec: TargetSpec) {
        self.group(|routes| routes.add(method, path, spec));
    }
}
