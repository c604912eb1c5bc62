// Assertions for dispatched responses

use crate::TestResponse;

pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {} (body: {:?})",
        expected,
        actual,
        response.body_string()
    );
}

/// Compare the whole JSON body with `expected`
pub fn assert_json(response: &TestResponse, expected: &serde_json::Value) {
    let actual: serde_json::Value = match response.body_json() {
        Ok(value) => value,
        Err(e) => panic!("Response body is not JSON: {} (body: {:?})", e, response.body_string()),
    };
    assert_eq!(&actual, expected, "JSON bodies do not match");
}

/// Header lookup is case-insensitive
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

pub fn assert_body_empty(response: &TestResponse) {
    assert!(
        response.body().is_empty(),
        "Expected an empty body, got {} bytes: {:?}",
        response.body().len(),
        response.body_string()
    );
}

pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}'. Body: {}",
        expected,
        body
    );
}

pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert the rendered error body carries `status` and `message`
pub fn assert_error_body(response: &TestResponse, status: u16, message: &str) {
    assert_status(response, status);
    assert_json(
        response,
        &serde_json::json!({"error": message, "status": status}),
    );
}
