// Core library for the Switchyard dispatch engine
// Route registration, resolution, the middleware pipeline and the dispatch boundary

pub mod cgi;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod registration;
pub mod request;
pub mod resolver;
pub mod route;
pub mod server;

// Re-export commonly used types
pub use config::*;
pub use controller::*;
pub use dispatch::*;
pub use error::*;
pub use http::*;
pub use middleware::*;
pub use pipeline::*;
pub use registration::{handler, ContextFrame, GroupBuilder, Routes, TargetSpec};
pub use request::*;
pub use resolver::*;
pub use route::{handler_fn, BoxFuture, HandlerFn, RouteEntry, RouteTable, Segment, Target};
