//! The transport seam and the default `ureq` transport.
//!
//! # Design
//! A transport performs one HTTP exchange for an `HttpRequest` and reports
//! what it saw: body bytes, header fields and an optional error. It does not
//! classify the outcome; that is `outcome::normalize`'s job. `perform` is
//! blocking; the dispatcher runs it on tokio's blocking pool.
//!
//! `UreqTransport` treats every completed exchange as data present, whatever
//! the HTTP status. Only failures to complete the exchange become a
//! `TransportError`.

use std::time::Duration;

use serde_json::Value;
use ureq::typestate::WithBody;
use ureq::RequestBuilder;

use crate::config::Parameters;
use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, Placement};

/// What a transport observed for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    /// Raw body bytes, present whenever an HTTP response was received.
    pub data: Option<Vec<u8>>,
    /// Response header fields in the order the transport produced them.
    pub header_fields: Vec<(String, Value)>,
    pub error: Option<TransportError>,
}

impl TransportResponse {
    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.header_fields.push((name.into(), value.into()));
        self
    }
}

/// Performs HTTP requests on behalf of a `RequestBuilder`.
pub trait Transport: Send + Sync {
    fn perform(&self, request: &HttpRequest) -> TransportResponse;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> TransportResponse + Send + Sync,
{
    fn perform(&self, request: &HttpRequest) -> TransportResponse {
        self(request)
    }
}

/// Default transport backed by a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    body_limit: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> UreqTransportBuilder {
        UreqTransportBuilder::default()
    }

    fn execute(&self, request: &HttpRequest) -> Result<TransportResponse, ureq::Error> {
        let (query, payload) = match (&request.parameters, request.placement()) {
            (None, _) => (Vec::new(), Payload::Empty),
            (Some(params), Placement::Query) => (flatten(params), Payload::Empty),
            (Some(params), Placement::Form) => (Vec::new(), Payload::Form(flatten(params))),
            (Some(params), Placement::Json) => (Vec::new(), Payload::Json(Value::Object(params.clone()))),
        };

        let url = request.url.as_str();
        let mut response = match request.method {
            HttpMethod::Get | HttpMethod::Delete => {
                let builder = if request.method == HttpMethod::Get {
                    self.agent.get(url)
                } else {
                    self.agent.delete(url)
                };
                let builder = prepare(builder, request, &query);
                match payload {
                    Payload::Empty => builder.call()?,
                    payload => send(builder.force_send_body(), payload)?,
                }
            }
            HttpMethod::Post | HttpMethod::Put => {
                let builder = if request.method == HttpMethod::Post {
                    self.agent.post(url)
                } else {
                    self.agent.put(url)
                };
                send(prepare(builder, request, &query), payload)?
            }
        };

        let mut header_fields: Vec<(String, Value)> = Vec::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match header_fields.iter_mut().find(|(existing, _)| existing.as_str() == name.as_str()) {
                Some((_, Value::String(joined))) => {
                    joined.push_str(", ");
                    joined.push_str(&value);
                }
                _ => header_fields.push((name.as_str().to_string(), Value::String(value))),
            }
        }

        let data = response.body_mut().with_config().limit(self.body_limit).read_to_vec()?;
        Ok(TransportResponse {
            data: Some(data),
            header_fields,
            error: None,
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn perform(&self, request: &HttpRequest) -> TransportResponse {
        match self.execute(request) {
            Ok(response) => response,
            Err(e) => TransportResponse::failed(classify(&e)),
        }
    }
}

/// Builder for `UreqTransport`.
#[derive(Debug, Clone, Default)]
pub struct UreqTransportBuilder {
    timeout: Option<Duration>,
    body_limit: Option<u64>,
}

impl UreqTransportBuilder {
    /// Bound the whole exchange, connect through body read.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap the number of body bytes read. A larger body fails the exchange.
    /// Unlimited by default.
    pub fn body_limit(mut self, bytes: u64) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    pub fn build(self) -> UreqTransport {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(self.timeout)
            .build()
            .new_agent();
        UreqTransport {
            agent,
            body_limit: self.body_limit.unwrap_or(u64::MAX),
        }
    }
}

enum Payload {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

fn prepare<B>(
    mut builder: RequestBuilder<B>,
    request: &HttpRequest,
    query: &[(String, String)],
) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in query {
        builder = builder.query(key, value);
    }
    builder
}

fn send(
    builder: RequestBuilder<WithBody>,
    payload: Payload,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match payload {
        Payload::Empty => builder.send_empty(),
        Payload::Form(pairs) => builder.send_form(pairs),
        Payload::Json(value) => builder.send_json(&value),
    }
}

fn classify(error: &ureq::Error) -> TransportError {
    let kind = match error {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
        ureq::Error::Io(io) => match io.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
            std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Io,
        },
        ureq::Error::BadUri(_) | ureq::Error::Http(_) | ureq::Error::Protocol(_) => {
            TransportErrorKind::Protocol
        }
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, error.to_string())
}

/// Flatten parameters into key/value pairs for query or form placement.
///
/// Arrays repeat the key with a `[]` suffix, objects nest as `key[sub]`.
/// Strings are taken verbatim, null becomes empty, other scalars use their
/// JSON text.
pub(crate) fn flatten(params: &Parameters) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten_value(key.clone(), value, &mut pairs);
    }
    pairs
}

fn flatten_value(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_value(format!("{key}[]"), item, out);
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                flatten_value(format!("{key}[{sub}]"), item, out);
            }
        }
        Value::String(s) => out.push((key, s.clone())),
        Value::Null => out.push((key, String::new())),
        other => out.push((key, other.to_string())),
    }
}
