//! Outcome normalization.
//!
//! # Design
//! A transport reports a `(data, header_fields, error)` triple. Callers only
//! ever see one shape, `Outcome`: a coarse status, the response headers with
//! each value wrapped in a one-element list, and a body. Classification runs
//! in a fixed priority order: data present wins, then a transport error,
//! then the "unknown error" sentinel for a transport that reported neither.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::http::HttpRequest;
use crate::transport::TransportResponse;

/// Status code delivered with a successful exchange.
pub const NET_CODE_SUCCESS: i32 = 0;
/// Status code delivered with a failed exchange.
pub const NET_CODE_FAIL: i32 = -1;

/// Body used when neither data nor an error description is available.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Response headers: field name to its values.
pub type ResponseHeaders = BTreeMap<String, Vec<String>>;

/// Transport-level result of a dispatch. Not an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Success => NET_CODE_SUCCESS,
            Status::Failure => NET_CODE_FAIL,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// The uniform payload of every dispatch callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<B> {
    pub status: Status,
    pub headers: ResponseHeaders,
    pub body: B,
}

impl<B> Outcome<B> {
    pub fn code(&self) -> i32 {
        self.status.code()
    }
}

impl Outcome<Option<Vec<u8>>> {
    pub(crate) fn failure(description: &str) -> Self {
        Outcome {
            status: Status::Failure,
            headers: ResponseHeaders::new(),
            body: Some(description.as_bytes().to_vec()),
        }
    }
}

/// Map a transport response onto an `Outcome`.
///
/// When `debug` is set and the exchange produced data, one diagnostic line
/// summarizing the request and the response headers is emitted.
pub fn normalize(
    response: TransportResponse,
    request: &HttpRequest,
    debug: bool,
) -> Outcome<Option<Vec<u8>>> {
    let TransportResponse {
        data,
        header_fields,
        error,
    } = response;

    if let Some(data) = data {
        let mut headers = ResponseHeaders::new();
        for (name, value) in header_fields {
            headers.insert(name, vec![stringify_header(&value)]);
        }
        if debug {
            log_exchange(request, &headers);
        }
        return Outcome {
            status: Status::Success,
            headers,
            body: Some(data),
        };
    }

    let description = match error {
        Some(error) => error.description,
        None => UNKNOWN_ERROR.to_string(),
    };
    Outcome::failure(&description)
}

/// Decode a raw outcome's body as UTF-8 text.
///
/// A missing body becomes `UNKNOWN_ERROR` with the status passed through.
/// Bytes that are not valid UTF-8 turn the outcome into a failure carrying
/// the decoder's message.
pub fn into_text(outcome: Outcome<Option<Vec<u8>>>) -> Outcome<String> {
    let Outcome {
        status,
        headers,
        body,
    } = outcome;
    match body {
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Outcome {
                status,
                headers,
                body: text,
            },
            Err(e) => {
                warn!(error = %e.utf8_error(), "response body is not valid UTF-8");
                Outcome {
                    status: Status::Failure,
                    headers,
                    body: format!("response body is not valid UTF-8: {}", e.utf8_error()),
                }
            }
        },
        None => Outcome {
            status,
            headers,
            body: UNKNOWN_ERROR.to_string(),
        },
    }
}

/// Render a header value as text.
pub fn stringify_header(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(stringify_header)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn log_exchange(request: &HttpRequest, response_headers: &ResponseHeaders) {
    let parameters = match &request.parameters {
        Some(params) => Value::Object(params.clone()).to_string(),
        None => "none".to_string(),
    };
    info!(
        url = %request.url,
        headers = ?request.headers,
        parameters = %parameters,
        method = %request.method,
        response_headers = ?response_headers,
        "http exchange"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestConfig;
    use crate::error::{TransportError, TransportErrorKind};
    use serde_json::json;

    fn request() -> HttpRequest {
        RequestConfig::default().to_request("http://localhost:3000/echo")
    }

    #[test]
    fn status_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::Failure.code(), -1);
        assert!(Status::Success.is_success());
        assert!(!Status::Failure.is_success());
    }

    #[test]
    fn data_wins_over_error() {
        let mut response = TransportResponse::with_data("payload").header("content-type", "text/plain");
        response.error = Some(TransportError::other("ignored"));

        let outcome = normalize(response, &request(), true);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.body.as_deref(), Some(b"payload".as_slice()));
        assert_eq!(outcome.headers["content-type"], vec!["text/plain".to_string()]);
    }

    #[test]
    fn empty_data_is_still_success() {
        let outcome = normalize(TransportResponse::with_data(Vec::<u8>::new()), &request(), false);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.body, Some(Vec::new()));
    }

    #[test]
    fn error_description_becomes_body() {
        let error = TransportError::new(TransportErrorKind::Connect, "connection refused");
        let outcome = normalize(TransportResponse::failed(error), &request(), true);
        assert_eq!(outcome.status, Status::Failure);
        assert_eq!(outcome.body.as_deref(), Some(b"connection refused".as_slice()));
    }

    #[test]
    fn neither_data_nor_error_is_unknown_error() {
        let outcome = normalize(TransportResponse::default(), &request(), true);
        assert_eq!(outcome.status, Status::Failure);
        assert!(outcome.headers.is_empty());
        assert_eq!(outcome.body.as_deref(), Some(b"unknown error".as_slice()));
    }

    #[test]
    fn failure_drops_response_headers() {
        let outcome = normalize(TransportResponse::default().header("x-a", "1"), &request(), false);
        assert_eq!(outcome.status, Status::Failure);
        assert!(outcome.headers.is_empty());
        assert_eq!(outcome.body.as_deref(), Some(b"unknown error".as_slice()));

        let error = TransportError::new(TransportErrorKind::Timeout, "timed out");
        let outcome = normalize(TransportResponse::failed(error).header("x-a", "1"), &request(), false);
        assert_eq!(outcome.status, Status::Failure);
        assert!(outcome.headers.is_empty());
        assert_eq!(outcome.body.as_deref(), Some(b"timed out".as_slice()));
    }

    #[test]
    fn headers_are_wrapped_without_case_folding() {
        let response = TransportResponse::with_data("x")
            .header("Content-Type", "a")
            .header("content-type", "b");
        let outcome = normalize(response, &request(), false);
        assert_eq!(outcome.headers.len(), 2);
        assert_eq!(outcome.headers["Content-Type"], vec!["a".to_string()]);
        assert_eq!(outcome.headers["content-type"], vec!["b".to_string()]);
    }

    #[test]
    fn later_duplicate_field_replaces_earlier() {
        let response = TransportResponse::with_data("x")
            .header("x-a", "first")
            .header("x-a", "second");
        let outcome = normalize(response, &request(), false);
        assert_eq!(outcome.headers["x-a"], vec!["second".to_string()]);
    }

    #[test]
    fn stringify_header_values() {
        assert_eq!(stringify_header(&json!("text")), "text");
        assert_eq!(stringify_header(&json!(42)), "42");
        assert_eq!(stringify_header(&json!(1.5)), "1.5");
        assert_eq!(stringify_header(&json!(false)), "false");
        assert_eq!(stringify_header(&Value::Null), "");
        assert_eq!(stringify_header(&json!(["a", 1, ["b"]])), "a, 1, b");
        assert_eq!(stringify_header(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }

    #[test]
    fn into_text_decodes_utf8() {
        let outcome = Outcome {
            status: Status::Success,
            headers: ResponseHeaders::new(),
            body: Some("héllo".as_bytes().to_vec()),
        };
        let text = into_text(outcome);
        assert_eq!(text.status, Status::Success);
        assert_eq!(text.body, "héllo");
    }

    #[test]
    fn into_text_missing_body_keeps_status() {
        for status in [Status::Success, Status::Failure] {
            let outcome = Outcome {
                status,
                headers: ResponseHeaders::new(),
                body: None,
            };
            let text = into_text(outcome);
            assert_eq!(text.status, status);
            assert_eq!(text.body, UNKNOWN_ERROR);
        }
    }

    #[test]
    fn into_text_invalid_utf8_is_failure() {
        let mut headers = ResponseHeaders::new();
        headers.insert("x".to_string(), vec!["y".to_string()]);
        let outcome = Outcome {
            status: Status::Success,
            headers: headers.clone(),
            body: Some(vec![0xff, 0xfe, 0x00]),
        };
        let text = into_text(outcome);
        assert_eq!(text.status, Status::Failure);
        assert_eq!(text.headers, headers);
        assert!(text.body.starts_with("response body is not valid UTF-8"));
    }
}
