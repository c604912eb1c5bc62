//! Long-running hyper adapter
//!
//! Connections are accepted concurrently, but every request is converted
//! into an [`Exchange`] and forwarded over one channel to a single
//! [`DispatchServer::dispatch_loop`] task, which answers them in arrival
//! order.

use crate::{DispatchServer, Error, Exchange, RequestData, WireResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming as IncomingBody, Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Exchanges buffered between the listener and the dispatch loop
const QUEUE_DEPTH: usize = 1024;

/// Serve `listener` until `shutdown` resolves; returns how many requests were dispatched.
pub async fn serve<F>(
    listener: TcpListener,
    server: Arc<DispatchServer>,
    shutdown: F,
) -> Result<usize, Error>
where
    F: Future<Output = ()> + Send,
{
    let addr = listener.local_addr()?;
    info!(%addr, routes = server.table().len(), "Listening");

    let (tx, rx) = mpsc::channel::<Exchange>(QUEUE_DEPTH);
    let dispatcher = {
        let server = server.clone();
        tokio::spawn(async move { server.dispatch_loop(rx).await })
    };
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!(%peer, "Connection accepted");
                let io = TokioIo::new(stream);
                let tx = tx.clone();
                let mut stop = stop_rx.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<IncomingBody>| {
                        let tx = tx.clone();
                        async move { forward(req, tx).await }
                    });
                    let conn = http1::Builder::new().serve_connection(io, service);
                    tokio::pin!(conn);

                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        _ = stop.changed() => {
                            // Finish the in-flight request, then close keep-alive connections.
                            conn.as_mut().graceful_shutdown();
                            conn.as_mut().await
                        }
                    };
                    if let Err(err) = result {
                        debug!(%peer, error = %err, "Connection closed with error");
                    }
                });
            }
        }
    }

    // Open connections hold senders; the loop drains once they have closed.
    let _ = stop_tx.send(true);
    drop(stop_rx);
    drop(tx);
    dispatcher.await.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

async fn forward(
    req: Request<IncomingBody>,
    tx: mpsc::Sender<Exchange>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let data = request_data(req).await?;
    let (exchange, reply) = Exchange::new(data);

    let wire = if tx.send(exchange).await.is_err() {
        error!("Dispatch loop is gone");
        unavailable()
    } else {
        reply.await.unwrap_or_else(|_| unavailable())
    };
    Ok(to_hyper(wire))
}

async fn request_data(req: Request<IncomingBody>) -> Result<RequestData, hyper::Error> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(String::from);

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.to_string(), value.to_string());
        }
    }

    let body = req.collect().await?.to_bytes();
    Ok(RequestData::from_raw(
        &method,
        &path,
        query.as_deref(),
        headers,
        body,
    ))
}

fn unavailable() -> WireResponse {
    let body = serde_json::json!({"error": "Service Unavailable", "status": 503});
    let mut wire = WireResponse {
        status: 503,
        body: Bytes::from(body.to_string()),
        ..Default::default()
    };
    wire.headers
        .insert("Content-Type".to_string(), "application/json".to_string());
    wire
}

fn to_hyper(wire: WireResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(wire.body));
    *response.status_mut() =
        http::StatusCode::from_u16(wire.status).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    let headers = response.headers_mut();
    for (key, value) in wire.headers {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(key.as_bytes()),
            http::header::HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }
    response
}
