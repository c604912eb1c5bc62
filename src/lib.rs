// Switchyard - route registration and dual-mode request dispatch
//
// Routes are declared once through nested groups, resolved by one resolver,
// and served either per process (CGI style) or by a long-running listener.

// Re-export core functionality
pub use switchyard_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use switchyard_config;

#[cfg(feature = "testing")]
pub use switchyard_testing;

pub mod demo;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Controller, DispatchConfig, DispatchServer, Error, HttpMethod, Middleware, Next, Reply,
        Request, RequestData, Response, Routes, handler,
    };
}
