//! Transport error type.
//!
//! # Design
//! Errors never cross the dispatch boundary as `Err`: they are folded into a
//! FAILURE outcome whose body is the error's `description`. The `kind` is
//! kept for callers that hold a `TransportResponse` directly (custom
//! transports, tests) and want to branch without string matching.

use std::fmt;

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection could not be established (refused, DNS, TLS).
    Connect,
    /// A configured timeout elapsed.
    Timeout,
    /// An I/O error while reading or writing.
    Io,
    /// The peer spoke something that is not valid HTTP, or the request
    /// could not be encoded.
    Protocol,
    /// The transport panicked while performing the request.
    Panicked,
    /// No async runtime was available to run the request on.
    Runtime,
    Other,
}

/// A failure reported by a transport instead of response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub description: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn other(description: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, description)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_bare_description() {
        let err = TransportError::new(TransportErrorKind::Connect, "connection refused");
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn other_sets_kind() {
        let err = TransportError::other("boom");
        assert_eq!(err.kind, TransportErrorKind::Other);
        assert_eq!(err.description, "boom");
    }
}
