//! Fluent HTTP request configuration with callback-based dispatch.
//!
//! # Overview
//! Callers configure a `RequestBuilder` through chained setters (debug flag,
//! method, parameters, encoding, headers) and dispatch it to a URL. The
//! outcome, whether a response, a transport error or an ambiguous empty
//! result, arrives as one `Outcome` through a callback or a future.
//!
//! # Design
//! - The network round-trip sits behind the `Transport` trait. `UreqTransport`
//!   is the default; tests and embedders plug in closures.
//! - Method and encoding are set by name through fixed tables; unknown names
//!   are ignored rather than rejected.
//! - Dispatch snapshots the configuration, runs the transport on tokio's
//!   blocking pool and delivers the callback through a `CallbackContext`
//!   (inline, or a `MainQueue` drained by the caller's main thread).
//! - Every dispatch calls back exactly once; failures travel the same path
//!   as successes and callers branch on the status code.

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod outcome;
pub mod transport;

pub use builder::{RawOutcome, RequestBuilder, TextOutcome};
pub use config::{Parameters, RequestConfig};
pub use context::{main_queue, CallbackContext, Inline, MainLoop, MainQueue};
pub use error::{TransportError, TransportErrorKind};
pub use http::{Encoding, HttpMethod, HttpRequest, Placement};
pub use outcome::{Outcome, ResponseHeaders, Status, NET_CODE_FAIL, NET_CODE_SUCCESS, UNKNOWN_ERROR};
pub use transport::{Transport, TransportResponse, UreqTransport, UreqTransportBuilder};
