//! Dispatches over real HTTP against the mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `RequestBuilder`
//! with the default `UreqTransport`. The `/echo` route reports what arrived
//! on the wire, so each test checks both the request placement and the
//! normalized outcome.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;

use reqchain_core::{
    main_queue, RawOutcome, RequestBuilder, Status, TextOutcome, UreqTransport, NET_CODE_FAIL,
    NET_CODE_SUCCESS,
};
use serde_json::{json, Value};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn builder() -> RequestBuilder {
    RequestBuilder::with_transport(UreqTransport::builder().timeout(Duration::from_secs(10)).build())
}

fn raw(builder: &RequestBuilder, url: &str) -> RawOutcome {
    let (tx, rx) = mpsc::channel();
    builder.request_raw(url, move |outcome| tx.send(outcome).unwrap());
    rx.recv_timeout(Duration::from_secs(15)).unwrap()
}

fn text(builder: &RequestBuilder, url: &str) -> TextOutcome {
    let (tx, rx) = mpsc::channel();
    builder.request_text(url, move |outcome| tx.send(outcome).unwrap());
    rx.recv_timeout(Duration::from_secs(15)).unwrap()
}

fn echo(builder: &RequestBuilder, addr: SocketAddr) -> Value {
    let outcome = text(builder, &format!("http://{addr}/echo"));
    assert_eq!(outcome.code(), NET_CODE_SUCCESS, "body: {}", outcome.body);
    serde_json::from_str(&outcome.body).unwrap()
}

fn params(value: Value) -> Option<reqchain_core::Parameters> {
    value.as_object().cloned()
}

#[test]
fn get_with_default_encoding_uses_query_string() {
    let addr = start_server();
    let mut b = builder();
    b.set_parameters(params(json!({"a": 1, "b": "x"})));

    let echoed = echo(&b, addr);
    assert_eq!(echoed["method"], "GET");
    let query = echoed["query"].as_str().unwrap();
    assert!(query.contains("a=1"), "{query}");
    assert!(query.contains("b=x"), "{query}");
    assert_eq!(echoed["body"], "");
}

#[test]
fn post_with_default_encoding_sends_form_body() {
    let addr = start_server();
    let mut b = builder();
    b.set_method("post").set_parameters(params(json!({"name": "ann"})));

    let echoed = echo(&b, addr);
    assert_eq!(echoed["method"], "POST");
    assert!(echoed["query"].is_null());
    assert_eq!(echoed["body"], "name=ann");
    assert_eq!(
        echoed["headers"]["content-type"],
        "application/x-www-form-urlencoded"
    );
}

#[test]
fn json_encoding_sends_json_body() {
    let addr = start_server();
    let mut b = builder();
    b.set_method("put")
        .set_encoding("json")
        .set_parameters(params(json!({"ids": [1, 2], "done": true})));

    let echoed = echo(&b, addr);
    assert_eq!(echoed["method"], "PUT");
    let content_type = echoed["headers"]["content-type"].as_str().unwrap();
    assert!(content_type.starts_with("application/json"), "{content_type}");
    let body: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(body, json!({"ids": [1, 2], "done": true}));
}

#[test]
fn query_string_encoding_on_delete() {
    let addr = start_server();
    let mut b = builder();
    b.set_method("delete")
        .set_encoding("queryString")
        .set_parameters(params(json!({"id": "42"})));

    let echoed = echo(&b, addr);
    assert_eq!(echoed["method"], "DELETE");
    assert_eq!(echoed["query"], "id=42");
}

#[test]
fn http_body_encoding_on_get_sends_body() {
    let addr = start_server();
    let mut b = builder();
    b.set_encoding("httpBody")
        .set_parameters(params(json!({"q": "rust"})));

    let echoed = echo(&b, addr);
    assert_eq!(echoed["method"], "GET");
    assert!(echoed["query"].is_null());
    assert_eq!(echoed["body"], "q=rust");
}

#[test]
fn unknown_names_keep_previous_configuration() {
    let addr = start_server();
    let mut b = builder();
    b.set_method("post").set_method("PATCH").set_encoding("xml");

    let echoed = echo(&b, addr);
    assert_eq!(echoed["method"], "POST");
}

#[test]
fn headers_are_sent_and_response_headers_normalized() {
    let addr = start_server();
    let mut b = builder();
    b.set_headers([("x-token", "abc"), ("x-trace", "1")])
        .set_header("x-trace", "2");

    let outcome = raw(&b, &format!("http://{addr}/echo"));
    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.headers["x-mock"], vec!["echo".to_string()]);
    assert!(outcome.headers.contains_key("content-type"));
    for values in outcome.headers.values() {
        assert_eq!(values.len(), 1);
    }

    let echoed: Value = serde_json::from_slice(outcome.body.as_deref().unwrap()).unwrap();
    assert_eq!(echoed["headers"]["x-token"], "abc");
    assert_eq!(echoed["headers"]["x-trace"], "2");
}

#[test]
fn http_error_status_is_still_success() {
    let addr = start_server();
    let outcome = text(&builder(), &format!("http://{addr}/status/404"));
    assert_eq!(outcome.code(), NET_CODE_SUCCESS);
    assert_eq!(outcome.body, "status 404");
}

#[test]
fn no_content_yields_empty_body() {
    let addr = start_server();
    let outcome = raw(&builder(), &format!("http://{addr}/empty"));
    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.body, Some(Vec::new()));
}

#[test]
fn raw_returns_exact_bytes() {
    let addr = start_server();
    let outcome = raw(&builder(), &format!("http://{addr}/bytes"));
    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.body.as_deref(), Some(mock_server::INVALID_UTF8));
}

#[test]
fn body_over_ten_mib_is_delivered_whole() {
    let addr = start_server();
    let len = 11 * 1024 * 1024;
    let outcome = raw(&builder(), &format!("http://{addr}/large/{len}"));
    assert_eq!(outcome.status, Status::Success);
    let body = outcome.body.unwrap();
    assert_eq!(body.len(), len);
    assert!(body.iter().all(|&b| b == b'a'));
}

#[test]
fn configured_body_limit_fails_larger_bodies() {
    let addr = start_server();
    let b = RequestBuilder::with_transport(
        UreqTransport::builder()
            .timeout(Duration::from_secs(10))
            .body_limit(1024)
            .build(),
    );

    let outcome = raw(&b, &format!("http://{addr}/large/4096"));
    assert_eq!(outcome.status, Status::Failure);
    assert!(outcome.headers.is_empty());

    let outcome = raw(&b, &format!("http://{addr}/large/512"));
    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.body.map(|body| body.len()), Some(512));
}

#[test]
fn text_reports_invalid_utf8_as_failure() {
    let addr = start_server();
    let outcome = text(&builder(), &format!("http://{addr}/bytes"));
    assert_eq!(outcome.code(), NET_CODE_FAIL);
    assert!(outcome.body.starts_with("response body is not valid UTF-8"));
}

#[test]
fn refused_connection_is_failure_with_description() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = raw(&builder(), &format!("http://{addr}/echo"));
    assert_eq!(outcome.status, Status::Failure);
    assert!(outcome.headers.is_empty());
    let body = outcome.body.unwrap();
    assert!(!body.is_empty());
    assert_ne!(body, b"unknown error");
}

#[test]
fn builder_is_reusable_across_dispatches() {
    let addr = start_server();
    let mut b = builder();
    let first = echo(&b, addr);
    b.set_method("post");
    let second = echo(&b, addr);
    let third = echo(&b, addr);

    assert_eq!(first["method"], "GET");
    assert_eq!(second["method"], "POST");
    assert_eq!(third["method"], "POST");
}

#[test]
fn main_queue_delivers_on_owner_thread() {
    let addr = start_server();
    let (queue, mut main_loop) = main_queue();
    let b = builder().callback_context(queue);
    let (tx, rx) = mpsc::channel();

    b.request_text(&format!("http://{addr}/echo"), move |outcome| {
        tx.send((outcome.status, std::thread::current().id())).unwrap();
    });
    assert!(main_loop.blocking_run_one());

    let (status, thread) = rx.try_recv().unwrap();
    assert_eq!(status, Status::Success);
    assert_eq!(thread, std::thread::current().id());
}

#[tokio::test(flavor = "multi_thread")]
async fn send_text_resolves_over_http() {
    let addr = start_server();
    let mut b = builder();
    b.set_method("delete");
    let outcome = b.send_text(&format!("http://{addr}/echo")).await;
    assert_eq!(outcome.status, Status::Success);
    let echoed: Value = serde_json::from_str(&outcome.body).unwrap();
    assert_eq!(echoed["method"], "DELETE");
}
