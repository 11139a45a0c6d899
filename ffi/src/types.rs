//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Inputs (`FfiHeader`) are borrowed from the caller for the duration of a
//! call. Outputs handed to callbacks (`FfiHeaderMap`, body pointers) are
//! borrowed from Rust for the duration of the callback; a caller that needs
//! them afterwards copies them. Nothing allocated here is ever handed to C
//! for freeing, apart from the two opaque handles.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::sync::Mutex;

use reqchain_core::{MainLoop, MainQueue, RequestBuilder, ResponseHeaders};

/// Opaque handle to a `RequestBuilder`. Every setter returns the same
/// pointer it was given, so calls can be nested or chained.
pub struct FfiRequestBuilder {
    pub(crate) inner: RequestBuilder,
}

/// Opaque handle to a main-thread callback queue.
///
/// Builders created with a queue post their callbacks to it; the owning
/// thread runs them with `reqchain_queue_pump` or `reqchain_queue_wait_one`.
pub struct FfiCallbackQueue {
    pub(crate) queue: MainQueue,
    pub(crate) main_loop: Mutex<MainLoop>,
}

// ---------------------------------------------------------------------------
// Request input
// ---------------------------------------------------------------------------

/// A single request header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

// ---------------------------------------------------------------------------
// Callback output
// ---------------------------------------------------------------------------

/// One response header field and its values.
#[repr(C)]
pub struct FfiHeaderField {
    pub name: *const c_char,
    pub values: *const *const c_char,
    pub values_len: u32,
}

/// Response headers passed to a callback. Valid only during the callback.
#[repr(C)]
pub struct FfiHeaderMap {
    pub fields: *const FfiHeaderField,
    pub len: u32,
}

/// Text dispatch callback: status code, headers, NUL-terminated body and the
/// caller's `user_data`.
pub type FfiTextCallback =
    extern "C" fn(code: i32, headers: *const FfiHeaderMap, body: *const c_char, user_data: *mut c_void);

/// Raw dispatch callback: status code, headers, body bytes (null when no
/// body is available) with their length, and the caller's `user_data`.
pub type FfiRawCallback = extern "C" fn(
    code: i32,
    headers: *const FfiHeaderMap,
    body: *const u8,
    body_len: usize,
    user_data: *mut c_void,
);

/// Owns the C strings behind an `FfiHeaderMap`.
pub(crate) struct HeaderStorage {
    _names: Vec<CString>,
    _values: Vec<Vec<CString>>,
    _value_ptrs: Vec<Vec<*const c_char>>,
    fields: Vec<FfiHeaderField>,
}

impl HeaderStorage {
    pub(crate) fn new(headers: &ResponseHeaders) -> Self {
        let names: Vec<CString> = headers.keys().map(|name| to_cstring(name)).collect();
        let values: Vec<Vec<CString>> = headers
            .values()
            .map(|values| values.iter().map(|v| to_cstring(v)).collect())
            .collect();
        let value_ptrs: Vec<Vec<*const c_char>> = values
            .iter()
            .map(|values| values.iter().map(|v| v.as_ptr()).collect())
            .collect();
        let fields = names
            .iter()
            .zip(&value_ptrs)
            .map(|(name, ptrs)| FfiHeaderField {
                name: name.as_ptr(),
                values: ptrs.as_ptr(),
                values_len: ptrs.len() as u32,
            })
            .collect();
        Self {
            _names: names,
            _values: values,
            _value_ptrs: value_ptrs,
            fields,
        }
    }

    pub(crate) fn map(&self) -> FfiHeaderMap {
        FfiHeaderMap {
            fields: self.fields.as_ptr(),
            len: self.fields.len() as u32,
        }
    }
}

/// Caller context carried to a callback on another thread.
pub(crate) struct UserData(*mut c_void);

// SAFETY: the pointer is never dereferenced on the Rust side; it is handed
// back to the caller's callback, which owns its thread-safety contract.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn get(&self) -> *mut c_void {
        self.0
    }
}

/// Convert to a C string, dropping interior NUL bytes.
pub(crate) fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// Borrow a C string argument as `&str`. Null or non-UTF-8 yields `None`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}
