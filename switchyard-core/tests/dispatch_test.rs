//! End-to-end dispatch through both execution modes

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use switchyard_core::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

/// Tags responses so tests can see which routes ran through it
struct Marker;

#[async_trait]
impl Middleware for Marker {
    async fn handle(&self, req: Request, next: Next) -> Result<Response, Error> {
        let response = next(req).await?;
        Ok(response.with_header("X-Marker", "M"))
    }
}

fn nested_server() -> DispatchServer {
    DispatchServer::builder()
        .middleware("M", Marker)
        .routes(|r| {
            r.prefix("lvl1").middleware("M").group(|r| {
                r.get("/hello", handler(|_req| async { Ok(json!({"route": "hello"})) }));
                r.prefix("lvl2").group(|r| {
                    r.get("/status", handler(|_req| async { Ok(json!({"route": "status"})) }));
                });
                r.get("/test", handler(|_req| async { Ok(json!({"route": "test"})) }));
            });
            r.get("/outside", handler(|_req| async { Ok(json!({"route": "outside"})) }));
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_nested_routes_end_to_end() {
    let server = nested_server();
    let patterns: Vec<String> = server.routes().map(|e| e.pattern.clone()).collect();
    assert_eq!(
        patterns,
        vec![
            "/api/lvl1/hello",
            "/api/lvl1/lvl2/status",
            "/api/lvl1/test",
            "/api/outside"
        ]
    );

    for (uri, route, marked) in [
        ("/api/lvl1/hello", "hello", true),
        ("/api/lvl1/lvl2/status/", "status", true),
        ("/api/lvl1/test", "test", true),
        ("/api/outside", "outside", false),
    ] {
        let wire = server.dispatch_once(RequestData::new("GET", uri)).await;
        assert_eq!(wire.status, 200, "{}", uri);
        assert_eq!(wire.json(), Some(json!({"route": route})));
        assert_eq!(wire.header("x-marker").is_some(), marked, "{}", uri);
    }
}

#[tokio::test]
async fn test_group_middleware_is_inherited_and_overridable() {
    let server = DispatchServer::builder()
        .middleware("M", Marker)
        .middleware("deny", ApiKeyMiddleware::new(["k"]))
        .routes(|r| {
            r.middleware("deny").group(|r| {
                r.get("/guarded", handler(|_req| async { Ok("guarded") }));
                r.middleware("M").get("/open", handler(|_req| async { Ok("open") }));
            });
        })
        .build()
        .unwrap();

    let wire = server.dispatch_once(RequestData::new("GET", "/api/guarded")).await;
    assert_eq!(wire.status, 401);

    let wire = server.dispatch_once(RequestData::new("GET", "/api/open")).await;
    assert_eq!(wire.status, 200);
    assert_eq!(wire.body_str(), Some("open"));
    assert_eq!(wire.header("x-marker"), Some("M"));
}

#[tokio::test]
async fn test_options_ignores_handler_status() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let server = DispatchServer::builder()
        .routes(move |r| {
            r.post("/login", handler(move |_req| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Response::new(418))
                }
            }));
        })
        .build()
        .unwrap();

    let wire = server.dispatch_once(RequestData::new("OPTIONS", "/api/login")).await;
    assert_eq!(wire.status, 204);
    assert!(wire.body.is_empty());
    assert!(wire.header("allow").is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let wire = server.dispatch_once(RequestData::new("POST", "/api/login")).await;
    assert_eq!(wire.status, 418);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_route_middleware_renders_500() {
    let server = DispatchServer::builder()
        .routes(|r| {
            r.middleware("nope").get("/x", handler(|_req| async { Ok(()) }));
        })
        .build()
        .unwrap();

    let wire = server.dispatch_once(RequestData::new("GET", "/api/x")).await;
    assert_eq!(wire.status, 500);
    assert_eq!(wire.json().unwrap()["error"], json!("Internal Server Error"));
}

#[tokio::test]
async fn test_global_middleware_runs_first() {
    let server = DispatchServer::builder()
        .middleware("request-id", RequestIdMiddleware)
        .middleware("deny", ApiKeyMiddleware::new(["k"]))
        .global("request-id")
        .routes(|r| {
            r.middleware("deny").get("/x", handler(|_req| async { Ok(()) }));
        })
        .build()
        .unwrap();

    let wire = server.dispatch_once(RequestData::new("GET", "/api/x")).await;
    assert_eq!(wire.status, 401);
    // the global layer wraps the short-circuit
    assert!(wire.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_dispatch_loop_keeps_requests_isolated() {
    let server = DispatchServer::builder()
        .middleware("request-id", RequestIdMiddleware)
        .global("request-id")
        .routes(|r| {
            r.get("/whoami", handler(|req: Request| async move {
                Ok(json!({
                    "id": req.attribute("request_id"),
                    "user": req.query("user"),
                }))
            }));
        })
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let loop_handle = {
        let server = Arc::new(server);
        tokio::spawn(async move { server.dispatch_loop(rx).await })
    };

    let mut bodies = Vec::new();
    for user in ["ann", "bob"] {
        let (exchange, reply) = Exchange::new(
            RequestData::new("GET", "/api/whoami").with_query(format!("user={}", user)),
        );
        tx.send(exchange).await.unwrap();
        bodies.push(reply.await.unwrap().json().unwrap());
    }
    drop(tx);

    assert_eq!(loop_handle.await.unwrap(), 2);
    assert_eq!(bodies[0]["user"], json!("ann"));
    assert_eq!(bodies[1]["user"], json!("bob"));
    assert_ne!(bodies[0]["id"], bodies[1]["id"]);
}

#[tokio::test]
async fn test_hyper_adapter_round_trip() {
    let server = Arc::new(nested_server());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let serving = tokio::spawn(server::serve(listener, server, async {
        let _ = stopped.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/lvl1/test HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{}", raw);
    assert!(raw.to_ascii_lowercase().contains("x-marker: m"));
    assert!(raw.ends_with(r#"{"route":"test"}"#));

    stop.send(()).unwrap();
    assert_eq!(serving.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_idle_keep_alive_connections() {
    let server = Arc::new(nested_server());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let serving = tokio::spawn(server::serve(listener, server, async {
        let _ = stopped.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/outside HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    while !raw.ends_with(br#"{"route":"outside"}"#) {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the response arrived");
        raw.extend_from_slice(&chunk[..n]);
    }
    assert!(raw.starts_with(b"HTTP/1.1 200 OK"));

    // The client keeps its socket open across shutdown.
    stop.send(()).unwrap();
    let served = tokio::time::timeout(std::time::Duration::from_secs(3), serving)
        .await
        .expect("serve did not return after shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(served, 1);

    let n = stream.read(&mut chunk).await.unwrap();
    assert_eq!(n, 0, "server should close the idle connection");
    drop(stream);
}
