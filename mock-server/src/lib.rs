use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Bytes served by `/bytes`; not valid UTF-8.
pub const INVALID_UTF8: &[u8] = &[0xff, 0xfe, 0x00, 0x80];

/// Largest body `/large/{len}` will serve.
pub const MAX_LARGE_BODY: usize = 64 * 1024 * 1024;

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/bytes", get(bytes))
        .route("/status/{code}", get(status))
        .route("/empty", get(empty))
        .route("/large/{len}", get(large))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Describe the request back to the caller as JSON.
async fn echo(
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let mut header_map = BTreeMap::new();
    for (name, value) in &headers {
        header_map.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    let description = describe(
        method.as_str(),
        query.as_deref(),
        header_map,
        &String::from_utf8_lossy(&body),
    );
    ([("x-mock", "echo")], Json(description))
}

fn describe(method: &str, query: Option<&str>, headers: BTreeMap<String, String>, body: &str) -> Value {
    json!({
        "method": method,
        "query": query,
        "headers": headers,
        "body": body,
    })
}

async fn bytes() -> impl IntoResponse {
    ([("content-type", "application/octet-stream")], INVALID_UTF8)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `len` bytes of `a`.
async fn large(Path(len): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if len > MAX_LARGE_BODY {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(vec![b'a'; len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_every_field() {
        let mut headers = BTreeMap::new();
        headers.insert("x-token".to_string(), "abc".to_string());
        let value = describe("POST", Some("a=1"), headers, "k=v");
        assert_eq!(value["method"], "POST");
        assert_eq!(value["query"], "a=1");
        assert_eq!(value["headers"]["x-token"], "abc");
        assert_eq!(value["body"], "k=v");
    }

    #[test]
    fn describe_missing_query_is_null() {
        let value = describe("GET", None, BTreeMap::new(), "");
        assert!(value["query"].is_null());
        assert_eq!(value["body"], "");
    }

    #[test]
    fn invalid_utf8_fixture_is_invalid() {
        assert!(std::str::from_utf8(INVALID_UTF8).is_err());
    }
}
