//! C-ABI wrapper around `reqchain-core`.
//!
//! # Overview
//! Exposes the fluent request builder through `extern "C"` functions so any
//! language with a C FFI can configure requests by name and receive outcomes
//! through callbacks, without linking to Rust's async runtime directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Setters take and return the same `FfiRequestBuilder*`. Null or
//!   unrecognized arguments leave the configuration unchanged.
//! - Dispatch returns immediately. The callback fires exactly once, either on
//!   a worker thread or, when the builder was created with a queue, on the
//!   thread that pumps that queue.
//! - Callback arguments are borrowed for the duration of the call. The
//!   builder may be freed while a dispatch is in flight.

pub mod types;

use std::os::raw::{c_char, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::time::Duration;

use reqchain_core::{main_queue, RequestBuilder};
use tracing::debug;

use types::*;

/// Status code of a successful exchange.
pub const REQCHAIN_NET_CODE_SUCCESS: i32 = 0;
/// Status code of a failed exchange.
pub const REQCHAIN_NET_CODE_FAIL: i32 = -1;

// ---------------------------------------------------------------------------
// Callback queue lifecycle
// ---------------------------------------------------------------------------

/// Create a callback queue. Free it with `reqchain_queue_free`.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_queue_new() -> *mut FfiCallbackQueue {
    catch_unwind(|| {
        let (queue, main_loop) = main_queue();
        Box::into_raw(Box::new(FfiCallbackQueue {
            queue,
            main_loop: Mutex::new(main_loop),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Run every callback queued so far on the calling thread. Returns how many
/// ran; 0 for a null queue.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_queue_pump(queue: *mut FfiCallbackQueue) -> u32 {
    catch_unwind(AssertUnwindSafe(|| {
        if queue.is_null() {
            return 0;
        }
        let queue = unsafe { &*queue };
        match queue.main_loop.lock() {
            Ok(mut main_loop) => main_loop.pump() as u32,
            Err(_) => 0,
        }
    }))
    .unwrap_or(0)
}

/// Block until one callback is queued and run it on the calling thread.
/// Returns false for a null queue.
///
/// The queue handle keeps the queue open, so with no dispatch in flight this
/// blocks forever. Call it only while a callback is pending, or use
/// `reqchain_queue_wait_one_timeout`.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_queue_wait_one(queue: *mut FfiCallbackQueue) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if queue.is_null() {
            return false;
        }
        let queue = unsafe { &*queue };
        match queue.main_loop.lock() {
            Ok(mut main_loop) => main_loop.blocking_run_one(),
            Err(_) => false,
        }
    }))
    .unwrap_or(false)
}

/// Wait up to `timeout_ms` for one callback and run it on the calling
/// thread. Returns whether a callback ran; false for a null queue.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_queue_wait_one_timeout(queue: *mut FfiCallbackQueue, timeout_ms: u32) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if queue.is_null() {
            return false;
        }
        let queue = unsafe { &*queue };
        match queue.main_loop.lock() {
            Ok(mut main_loop) => main_loop.run_one_timeout(Duration::from_millis(u64::from(timeout_ms))),
            Err(_) => false,
        }
    }))
    .unwrap_or(false)
}

/// Free a queue. Callbacks still in flight for it are discarded. Safe to
/// call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_queue_free(queue: *mut FfiCallbackQueue) {
    if !queue.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(queue) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Builder lifecycle
// ---------------------------------------------------------------------------

/// Create a builder with default configuration (debug on, GET, no
/// parameters, default encoding, no headers).
///
/// With a non-null `queue`, callbacks are delivered through it; otherwise
/// they run on a worker thread. Free the builder with `reqchain_builder_free`.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_new(queue: *const FfiCallbackQueue) -> *mut FfiRequestBuilder {
    catch_unwind(AssertUnwindSafe(|| {
        let mut inner = RequestBuilder::new();
        if !queue.is_null() {
            let queue = unsafe { &*queue };
            inner = inner.callback_context(queue.queue.clone());
        }
        Box::into_raw(Box::new(FfiRequestBuilder { inner }))
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a builder created by `reqchain_builder_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_free(builder: *mut FfiRequestBuilder) {
    if !builder.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(builder) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Apply `f` to the builder behind `builder` and return `builder`.
fn configure(
    builder: *mut FfiRequestBuilder,
    f: impl FnOnce(&mut RequestBuilder),
) -> *mut FfiRequestBuilder {
    if builder.is_null() {
        return builder;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let builder = unsafe { &mut *builder };
        f(&mut builder.inner);
    }));
    builder
}

#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_set_debug(
    builder: *mut FfiRequestBuilder,
    enabled: bool,
) -> *mut FfiRequestBuilder {
    configure(builder, |b| {
        b.set_debug(enabled);
    })
}

/// Set the method by name: "get", "post", "delete" or "put". Anything else,
/// including null, is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_set_method(
    builder: *mut FfiRequestBuilder,
    name: *const c_char,
) -> *mut FfiRequestBuilder {
    configure(builder, |b| {
        if let Some(name) = unsafe { str_arg(name) } {
            b.set_method(name);
        }
    })
}

/// Replace the parameters with a JSON object. Null clears them; text that
/// is not a JSON object is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_set_parameters_json(
    builder: *mut FfiRequestBuilder,
    json: *const c_char,
) -> *mut FfiRequestBuilder {
    configure(builder, |b| {
        if json.is_null() {
            b.set_parameters(None);
            return;
        }
        let parsed = unsafe { str_arg(json) }.map(serde_json::from_str::<serde_json::Value>);
        match parsed {
            Some(Ok(serde_json::Value::Object(map))) => {
                b.set_parameters(Some(map));
            }
            _ => debug!("ignoring parameters that are not a JSON object"),
        }
    })
}

/// Set the encoding by name: "default", "httpBody", "json" or
/// "queryString". Anything else, including null, is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_set_encoding(
    builder: *mut FfiRequestBuilder,
    name: *const c_char,
) -> *mut FfiRequestBuilder {
    configure(builder, |b| {
        if let Some(name) = unsafe { str_arg(name) } {
            b.set_encoding(name);
        }
    })
}

/// Replace all headers with `len` entries read from `headers`. Entries
/// with a null or non-UTF-8 key or value are skipped. A null `headers`
/// clears them.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_set_headers(
    builder: *mut FfiRequestBuilder,
    headers: *const FfiHeader,
    len: u32,
) -> *mut FfiRequestBuilder {
    configure(builder, |b| {
        if headers.is_null() || len == 0 {
            b.set_headers(std::iter::empty::<(String, String)>());
            return;
        }
        let entries = unsafe { std::slice::from_raw_parts(headers, len as usize) };
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .filter_map(|h| Some((unsafe { str_arg(h.key) }?, unsafe { str_arg(h.value) }?)))
            .collect();
        b.set_headers(pairs);
    })
}

/// Insert or overwrite one header. Ignored if `key` or `value` is null.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_builder_set_header(
    builder: *mut FfiRequestBuilder,
    key: *const c_char,
    value: *const c_char,
) -> *mut FfiRequestBuilder {
    configure(builder, |b| {
        if let (Some(key), Some(value)) = (unsafe { str_arg(key) }, unsafe { str_arg(value) }) {
            b.set_header(key, value);
        }
    })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Dispatch to `url` and deliver the body as text.
///
/// Returns false, and never calls back, if `builder`, `url` or `callback`
/// is null. Otherwise returns true and `callback` fires exactly once. Interior
/// NUL bytes in the body are dropped.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_request_text(
    builder: *const FfiRequestBuilder,
    url: *const c_char,
    callback: Option<FfiTextCallback>,
    user_data: *mut c_void,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let (Some(callback), false) = (callback, builder.is_null()) else {
            return false;
        };
        let Some(url) = (unsafe { str_arg(url) }) else {
            return false;
        };
        let builder = unsafe { &*builder };
        let user_data = UserData::new(user_data);
        builder.inner.request_text(url, move |outcome| {
            let headers = HeaderStorage::new(&outcome.headers);
            let body = to_cstring(&outcome.body);
            callback(outcome.code(), &headers.map(), body.as_ptr(), user_data.get());
        });
        true
    }))
    .unwrap_or(false)
}

/// Dispatch to `url` and deliver the raw body bytes.
///
/// Same contract as `reqchain_request_text`. `body` is null when no body is
/// available; an empty body is a non-null pointer with `body_len` 0.
#[unsafe(no_mangle)]
pub extern "C" fn reqchain_request_raw(
    builder: *const FfiRequestBuilder,
    url: *const c_char,
    callback: Option<FfiRawCallback>,
    user_data: *mut c_void,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let (Some(callback), false) = (callback, builder.is_null()) else {
            return false;
        };
        let Some(url) = (unsafe { str_arg(url) }) else {
            return false;
        };
        let builder = unsafe { &*builder };
        let user_data = UserData::new(user_data);
        builder.inner.request_raw(url, move |outcome| {
            let headers = HeaderStorage::new(&outcome.headers);
            let (body, body_len) = match &outcome.body {
                Some(bytes) => (bytes.as_ptr(), bytes.len()),
                None => (std::ptr::null(), 0),
            };
            callback(outcome.code(), &headers.map(), body, body_len, user_data.get());
        });
        true
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
