//! Fluent request configuration and dispatch.
//!
//! # Design
//! `RequestBuilder` owns a `RequestConfig` and exposes `&mut self -> &mut Self`
//! setters, so a chain of calls always mutates and returns the same builder.
//! Method and encoding are set by name; names outside the fixed tables are
//! ignored and the previous value stays.
//!
//! Dispatch snapshots the configuration into an `HttpRequest`, runs the
//! transport on tokio's blocking pool and hands the normalized outcome to the
//! callback through the builder's `CallbackContext`. The caller's thread is
//! never blocked, and every dispatch produces exactly one outcome. A panicking
//! transport or an unusable runtime is reported as a failure, not lost.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, warn};

use crate::config::{Parameters, RequestConfig};
use crate::context::{CallbackContext, Inline};
use crate::error::{TransportError, TransportErrorKind};
use crate::http::{Encoding, HttpMethod, HttpRequest};
use crate::outcome::{into_text, normalize, Outcome};
use crate::transport::{Transport, TransportResponse, UreqTransport};

/// Raw-bytes dispatch result.
pub type RawOutcome = Outcome<Option<Vec<u8>>>;
/// Text dispatch result.
pub type TextOutcome = Outcome<String>;

#[derive(Clone)]
pub struct RequestBuilder {
    config: RequestConfig,
    transport: Arc<dyn Transport>,
    context: Arc<dyn CallbackContext>,
    runtime: Option<Handle>,
}

impl RequestBuilder {
    /// Default configuration, `UreqTransport`, callbacks run inline.
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }

    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            config: RequestConfig::default(),
            transport: Arc::new(transport),
            context: Arc::new(Inline),
            runtime: None,
        }
    }

    /// Run callbacks through `context` instead of inline.
    pub fn callback_context(mut self, context: impl CallbackContext + 'static) -> Self {
        self.context = Arc::new(context);
        self
    }

    /// Dispatch on `handle`. Without one, the ambient runtime is used if
    /// there is one, otherwise a shared background runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn set_debug(&mut self, enabled: bool) -> &mut Self {
        self.config.debug = enabled;
        self
    }

    /// Set the method by name (`get`, `post`, `delete`, `put`). Other names
    /// leave the method unchanged.
    pub fn set_method(&mut self, name: &str) -> &mut Self {
        match HttpMethod::from_name(name) {
            Some(method) => self.config.method = method,
            None => debug!(name = %name, "ignoring unknown method name"),
        }
        self
    }

    /// Replace the parameters. `None` clears them.
    pub fn set_parameters(&mut self, parameters: Option<Parameters>) -> &mut Self {
        self.config.parameters = parameters;
        self
    }

    /// Set the encoding by name (`default`, `httpBody`, `json`,
    /// `queryString`). Other names leave the encoding unchanged.
    pub fn set_encoding(&mut self, name: &str) -> &mut Self {
        match Encoding::from_name(name) {
            Some(encoding) => self.config.encoding = encoding,
            None => debug!(name = %name, "ignoring unknown encoding name"),
        }
        self
    }

    /// Replace all headers.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Insert or overwrite a single header.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Dispatch to `url` and deliver the raw body to `callback`.
    pub fn request_raw<F>(&self, url: &str, callback: F)
    where
        F: FnOnce(RawOutcome) + Send + 'static,
    {
        let request = self.config.to_request(url);
        let debug = self.config.debug;
        let pending = Pending::new(callback, Arc::clone(&self.context));

        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(error) => {
                pending.deliver(RawOutcome::failure(&error.description));
                return;
            }
        };

        // A runtime that is shutting down drops the job unrun; `pending`
        // then reports the failure from its destructor.
        let transport = Arc::clone(&self.transport);
        handle.spawn_blocking(move || {
            pending.deliver(exchange(transport.as_ref(), &request, debug));
        });
    }

    /// Dispatch to `url` and deliver the body decoded as UTF-8 text.
    pub fn request_text<F>(&self, url: &str, callback: F)
    where
        F: FnOnce(TextOutcome) + Send + 'static,
    {
        self.request_raw(url, move |outcome| callback(into_text(outcome)));
    }

    /// Future form of `request_raw`. Resolves where it is awaited; the
    /// callback context is not involved.
    pub async fn send_raw(&self, url: &str) -> RawOutcome {
        let request = self.config.to_request(url);
        let debug = self.config.debug;
        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(error) => return RawOutcome::failure(&error.description),
        };

        let transport = Arc::clone(&self.transport);
        match handle
            .spawn_blocking(move || exchange(transport.as_ref(), &request, debug))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => RawOutcome::failure(&format!("dispatch aborted: {e}")),
        }
    }

    /// Future form of `request_text`.
    pub async fn send_text(&self, url: &str) -> TextOutcome {
        into_text(self.send_raw(url).await)
    }

    fn handle(&self) -> Result<Handle, TransportError> {
        if let Some(handle) = &self.runtime {
            return Ok(handle.clone());
        }
        if let Ok(handle) = Handle::try_current() {
            return Ok(handle);
        }
        shared_runtime().map(|runtime| runtime.handle().clone())
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("config", &self.config)
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

/// A callback that has not been delivered yet. Dropping it undelivered
/// schedules a failure, so the callback still fires exactly once.
struct Pending<F>
where
    F: FnOnce(RawOutcome) + Send + 'static,
{
    callback: Option<F>,
    context: Arc<dyn CallbackContext>,
}

impl<F> Pending<F>
where
    F: FnOnce(RawOutcome) + Send + 'static,
{
    fn new(callback: F, context: Arc<dyn CallbackContext>) -> Self {
        Self {
            callback: Some(callback),
            context,
        }
    }

    fn deliver(mut self, outcome: RawOutcome) {
        if let Some(callback) = self.callback.take() {
            self.context.schedule(Box::new(move || callback(outcome)));
        }
    }
}

impl<F> Drop for Pending<F>
where
    F: FnOnce(RawOutcome) + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!("dispatch dropped before it ran, reporting failure");
            let outcome = RawOutcome::failure(DISPATCH_DROPPED);
            self.context.schedule(Box::new(move || callback(outcome)));
        }
    }
}

const DISPATCH_DROPPED: &str = "dispatch aborted: runtime shut down";

fn exchange(transport: &dyn Transport, request: &HttpRequest, debug: bool) -> RawOutcome {
    let response = match panic::catch_unwind(AssertUnwindSafe(|| transport.perform(request))) {
        Ok(response) => response,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            TransportResponse::failed(TransportError::new(
                TransportErrorKind::Panicked,
                format!("transport panicked: {message}"),
            ))
        }
    };
    normalize(response, request, debug)
}

fn shared_runtime() -> Result<&'static Runtime, TransportError> {
    static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("reqchain-dispatch")
                .enable_all()
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| {
            TransportError::new(
                TransportErrorKind::Runtime,
                format!("no async runtime available: {e}"),
            )
        })
}
