// Route entries, handler targets and the append-only route table

use crate::{Error, HttpMethod, Reply, Request};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future used at every dynamic seam.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// An inline route handler
pub type HandlerFn = Arc<dyn Fn(Request) -> BoxFuture<Result<Reply, Error>> + Send + Sync>;

/// Wrap an async closure or fn as a [`HandlerFn`].
pub fn handler_fn<F, Fut, R>(f: F) -> HandlerFn
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(move |req| {
        let fut = f(req);
        Box::pin(async move { fut.await.map(Into::into) })
    })
}

/// What a route points at.
#[derive(Clone)]
pub enum Target {
    Closure(HandlerFn),
    ControllerMethod { class: String, method: String },
}

impl Target {
    pub fn controller(class: impl Into<String>, method: impl Into<String>) -> Self {
        Target::ControllerMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn is_closure(&self) -> bool {
        matches!(self, Target::Closure(_))
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Target::Closure(a), Target::Closure(b)) => Arc::ptr_eq(a, b),
            (
                Target::ControllerMethod { class, method },
                Target::ControllerMethod {
                    class: other_class,
                    method: other_method,
                },
            ) => class == other_class && method == other_method,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Closure(_) => f.write_str("Closure(..)"),
            Target::ControllerMethod { class, method } => write!(f, "{}@{}", class, method),
        }
    }
}

/// One slash-delimited piece of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
            _ => Segment::Literal(raw.to_string()),
        }
    }

    /// Literal segments match verbatim, parameters match any non-empty value.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == value,
            Segment::Param(_) => !value.is_empty(),
        }
    }
}

/// A registered route. Never mutated after registration.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteEntry {
    /// Registration order across the whole table
    pub index: usize,
    pub method: HttpMethod,
    /// Literal part of the pattern, up to the first parameter segment
    pub prefix: String,
    /// Full pattern, root prefix included
    pub pattern: String,
    pub target: Target,
    pub middleware: Vec<String>,
    pub namespace: Option<String>,
    segments: Vec<Segment>,
}

impl RouteEntry {
    pub fn new(method: HttpMethod, pattern: impl AsRef<str>, target: Target) -> Self {
        let pattern = join_path([pattern.as_ref()]);
        let segments: Vec<Segment> = split_segments(&pattern)
            .into_iter()
            .map(Segment::parse)
            .collect();
        let literals: Vec<&str> = segments
            .iter()
            .map_while(|s| match s {
                Segment::Literal(l) => Some(l.as_str()),
                Segment::Param(_) => None,
            })
            .collect();
        let prefix = join_path(literals);

        Self {
            index: 0,
            method,
            prefix,
            pattern,
            target,
            middleware: Vec::new(),
            namespace: None,
            segments,
        }
    }

    pub fn with_middleware(mut self, middleware: Vec<String>) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Structural match: equal segment counts, every segment accepts its value.
    pub fn matches(&self, uri_segments: &[&str]) -> bool {
        self.segments.len() == uri_segments.len()
            && self
                .segments
                .iter()
                .zip(uri_segments)
                .all(|(segment, value)| segment.matches(value))
    }
}

/// Ordered, append-only route storage keyed by method.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<HttpMethod, Vec<Arc<RouteEntry>>>,
    registered: usize,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route; returns its registration index.
    pub fn register(&mut self, mut entry: RouteEntry) -> usize {
        let index = self.registered;
        entry.index = index;
        self.registered += 1;
        self.routes
            .entry(entry.method)
            .or_default()
            .push(Arc::new(entry));
        index
    }

    /// Routes for `method` in registration order.
    pub fn entries_for(&self, method: HttpMethod) -> Result<&[Arc<RouteEntry>], Error> {
        match self.routes.get(&method) {
            Some(entries) if !entries.is_empty() => Ok(entries),
            _ => Err(Error::NoRoutesForMethod(method.to_string())),
        }
    }

    /// Methods with at least one route
    pub fn methods(&self) -> impl Iterator<Item = HttpMethod> + '_ {
        self.routes
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(method, _)| *method)
    }

    /// All routes, grouped by method, each group in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.routes.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }
}

/// Join path pieces into `/a/b/c`, dropping empty segments. Empty input gives `/`.
pub fn join_path<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let segments: Vec<&str> = parts
        .into_iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Strip trailing slashes unless the URI is the root; force a leading slash.
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Split a normalized path on `/`. The root has no segments; inner empty
/// segments are kept so they can fail to match.
pub fn split_segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}
