//! One-request-per-process adapter (CGI)
//!
//! The web server describes the request in environment variables and pipes
//! the body on stdin. The response is written to stdout as a `Status:` line,
//! headers, a blank line and the body.

use crate::{DispatchServer, Error, RequestData, WireResponse};
use bytes::Bytes;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Build a request snapshot from CGI meta-variables.
pub fn request_from_cgi(vars: &HashMap<String, String>, body: Bytes) -> RequestData {
    let method = vars
        .get("REQUEST_METHOD")
        .map(String::as_str)
        .unwrap_or("GET");

    let (path, query) = match vars.get("PATH_INFO").filter(|p| !p.is_empty()) {
        Some(path) => (path.clone(), vars.get("QUERY_STRING").cloned()),
        None => {
            let uri = vars.get("REQUEST_URI").map(String::as_str).unwrap_or("/");
            match uri.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (uri.to_string(), vars.get("QUERY_STRING").cloned()),
            }
        }
    };

    let mut headers = HashMap::new();
    for (key, value) in vars {
        if let Some(name) = key.strip_prefix("HTTP_") {
            headers.insert(name.replace('_', "-").to_ascii_lowercase(), value.clone());
        }
    }
    for (key, name) in [("CONTENT_TYPE", "content-type"), ("CONTENT_LENGTH", "content-length")] {
        if let Some(value) = vars.get(key).filter(|v| !v.is_empty()) {
            headers.insert(name.to_string(), value.clone());
        }
    }

    RequestData::from_raw(method, &path, query.as_deref(), headers, body)
}

/// Serialize a response in CGI form.
pub fn render_cgi(wire: &WireResponse) -> Vec<u8> {
    let reason = http::StatusCode::from_u16(wire.status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("");

    let mut out = format!("Status: {} {}\r\n", wire.status, reason).into_bytes();
    for (key, value) in &wire.headers {
        out.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&wire.body);
    out
}

/// Answer the single request described by the process environment and stdin.
pub async fn run_once(server: &DispatchServer) -> Result<u16, Error> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    let length = vars
        .get("CONTENT_LENGTH")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let mut body = Vec::new();
    if length > 0 {
        tokio::io::stdin().take(length).read_to_end(&mut body).await?;
    }

    let data = request_from_cgi(&vars, Bytes::from(body));
    let wire = server.dispatch_once(data).await;
    debug!(status = wire.status, "CGI request answered");

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&render_cgi(&wire)).await?;
    stdout.flush().await?;
    Ok(wire.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_request_from_path_info() {
        let data = request_from_cgi(
            &vars(&[
                ("REQUEST_METHOD", "POST"),
                ("PATH_INFO", "/api/keys/abc"),
                ("QUERY_STRING", "verbose=1"),
                ("CONTENT_TYPE", "application/json"),
                ("HTTP_X_API_KEY", "secret"),
            ]),
            Bytes::from_static(br#"{"label":"ci"}"#),
        );
        assert_eq!(data.method, "POST");
        assert_eq!(data.uri, "/api/keys/abc");
        assert_eq!(data.raw_query.as_deref(), Some("verbose=1"));
        assert_eq!(data.header("x-api-key"), Some("secret"));
        assert_eq!(data.parsed_body.get("label"), Some(&serde_json::json!("ci")));
    }

    #[test]
    fn test_request_from_request_uri() {
        let data = request_from_cgi(
            &vars(&[("REQUEST_METHOD", "GET"), ("REQUEST_URI", "/api/users%2042?page=2")]),
            Bytes::new(),
        );
        assert_eq!(data.uri, "/api/users 42");
        assert_eq!(data.raw_query.as_deref(), Some("page=2"));
    }

    #[test]
    fn test_render_cgi() {
        let mut wire = WireResponse {
            status: 404,
            body: Bytes::from_static(b"{}"),
            ..Default::default()
        };
        wire.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        let out = String::from_utf8(render_cgi(&wire)).unwrap();
        assert_eq!(
            out,
            "Status: 404 Not Found\r\nContent-Type: application/json\r\n\r\n{}"
        );
    }
}
