//! Testing utilities for Switchyard dispatch servers.
//!
//! [`TestClient`] drives a [`DispatchServer`](switchyard_core::DispatchServer)
//! in-process through `dispatch_once`, so tests exercise resolution, the
//! middleware pipeline and rendering exactly as an adapter would, without a
//! socket.
//!
//! ```
//! use switchyard_core::{handler, DispatchServer};
//! use switchyard_testing::*;
//!
//! # tokio_test::block_on(async {
//! let server = DispatchServer::builder()
//!     .routes(|r| {
//!         r.get("/hello", handler(|_req| async { Ok(serde_json::json!({"hello": "world"})) }));
//!     })
//!     .build()
//!     .unwrap();
//!
//! let client = TestClient::new(server);
//! let response = client.get("/api/hello").await;
//! assert_status(&response, 200);
//! assert_json(&response, &serde_json::json!({"hello": "world"}));
//! # });
//! ```

pub mod assertions;
pub mod test_client;

pub use assertions::*;
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};
