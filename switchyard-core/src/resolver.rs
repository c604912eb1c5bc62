//! Request resolution: method + URI to a bound [`Action`].
//!
//! # Algorithm
//!
//! 1. Normalize the URI (trailing slash stripped, root kept as `/`).
//! 2. Keep routes of the method whose literal prefix starts the URI.
//! 3. Match segment by segment; counts must be equal, literals match
//!    verbatim, `{name}` matches any non-empty value.
//! 4. The earliest registered match wins.
//! 5. Bind parameters; values must be ASCII alphanumeric.
//! 6. Re-check controller targets against the registry.
//!
//! `HEAD` resolves against `GET` routes. `OPTIONS` tries every method that
//! has routes, in table order.
//!
//! Resolution reads the table only, so identical inputs give equal actions.

use crate::route::{normalize_uri, split_segments};
use crate::{ControllerRegistry, Error, HttpMethod, RouteEntry, RouteTable, Segment, Target};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// The per-request binding of a matched route to its target and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Normalized URI that was resolved
    pub uri: String,
    pub route: Arc<RouteEntry>,
    pub target: Target,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub middleware: Vec<String>,
}

impl Action {
    /// Registration index of the matched route
    pub fn route_index(&self) -> usize {
        self.route.index
    }
}

/// Read-only view used to resolve requests against a table.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    table: &'a RouteTable,
    controllers: &'a ControllerRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a RouteTable, controllers: &'a ControllerRegistry) -> Self {
        Self { table, controllers }
    }

    pub fn resolve(
        &self,
        method: HttpMethod,
        uri: &str,
        query_params: &HashMap<String, String>,
    ) -> Result<Action, Error> {
        let uri = normalize_uri(uri);
        let segments = split_segments(&uri);

        let route = match method {
            HttpMethod::HEAD => self.find(HttpMethod::GET, &uri, &segments)?,
            HttpMethod::OPTIONS => self.find_any(&uri, &segments)?,
            other => self.find(other, &uri, &segments)?,
        };

        let path_params = extract_params(&route, &segments)?;
        let target = self.materialize(&route.target)?;

        Ok(Action {
            middleware: route.middleware.clone(),
            uri,
            route,
            target,
            path_params,
            query_params: query_params.clone(),
        })
    }

    fn find(
        &self,
        method: HttpMethod,
        uri: &str,
        segments: &[&str],
    ) -> Result<Arc<RouteEntry>, Error> {
        let entries = self.table.entries_for(method)?;
        let mut candidates = 0usize;
        for entry in entries {
            if !uri.starts_with(entry.prefix.as_str()) {
                continue;
            }
            candidates += 1;
            if entry.matches(segments) {
                trace!(
                    method = %method,
                    uri = %uri,
                    pattern = %entry.pattern,
                    candidates,
                    "Route matched"
                );
                return Ok(entry.clone());
            }
        }
        trace!(method = %method, uri = %uri, candidates, "No route matched");
        Err(Error::RouteNotFound(format!("{} {}", method, uri)))
    }

    fn find_any(&self, uri: &str, segments: &[&str]) -> Result<Arc<RouteEntry>, Error> {
        if self.table.is_empty() {
            return Err(Error::NoRoutesForMethod(HttpMethod::OPTIONS.to_string()));
        }
        self.table
            .methods()
            .find_map(|method| self.find(method, uri, segments).ok())
            .ok_or_else(|| Error::RouteNotFound(format!("OPTIONS {}", uri)))
    }

    fn materialize(&self, target: &Target) -> Result<Target, Error> {
        if let Target::ControllerMethod { class, method } = target {
            self.controllers.resolve(class, method)?;
        }
        Ok(target.clone())
    }
}

/// Bind `{name}` segments of `entry` to the URI segments.
pub fn extract_params(
    entry: &RouteEntry,
    uri_segments: &[&str],
) -> Result<HashMap<String, String>, Error> {
    if entry.segments().len() != uri_segments.len() {
        return Err(Error::SegmentCountMismatch {
            pattern: entry.pattern.clone(),
            uri: format!("/{}", uri_segments.join("/")),
            expected: entry.segments().len(),
            actual: uri_segments.len(),
        });
    }

    let mut params = HashMap::new();
    for (segment, value) in entry.segments().iter().zip(uri_segments) {
        if let Segment::Param(name) = segment {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Error::InvalidPathParameter {
                    name: name.clone(),
                    value: value.to_string(),
                });
            }
            params.insert(name.clone(), value.to_string());
        }
    }
    Ok(params)
}
