//! Request description handed to a transport.
//!
//! # Design
//! Method and encoding are closed enums reachable from caller-supplied names
//! through fixed lookup tables. A miss yields `None`; the builder turns that
//! into "keep the previous value". The encoding is only a tag here: where the
//! parameters end up on the wire is described by `Placement`, and the actual
//! serialization is left to the transport.
//!
//! `HttpRequest` is an owned snapshot of the builder's configuration at
//! dispatch time, so reconfiguring a builder never races an in-flight call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Parameters;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    const TABLE: [(&'static str, HttpMethod); 4] = [
        ("get", HttpMethod::Get),
        ("post", HttpMethod::Post),
        ("delete", HttpMethod::Delete),
        ("put", HttpMethod::Put),
    ];

    /// Look `name` up in the fixed method table. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, method)| *method)
    }

    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter encoding tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Encoding {
    #[default]
    Default,
    HttpBody,
    Json,
    QueryString,
}

/// Where a transport puts the parameters of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Appended to the URL as a query string.
    Query,
    /// Sent as an `application/x-www-form-urlencoded` body.
    Form,
    /// Sent as an `application/json` body.
    Json,
}

impl Encoding {
    const TABLE: [(&'static str, Encoding); 4] = [
        ("default", Encoding::Default),
        ("httpBody", Encoding::HttpBody),
        ("json", Encoding::Json),
        ("queryString", Encoding::QueryString),
    ];

    /// Look `name` up in the fixed encoding table. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, encoding)| *encoding)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Default => "default",
            Encoding::HttpBody => "httpBody",
            Encoding::Json => "json",
            Encoding::QueryString => "queryString",
        }
    }

    /// Resolve where parameters go for `method`.
    ///
    /// `Default` is method dependent: methods without a conventional body
    /// (GET, DELETE) carry parameters in the query string, the others in a
    /// form body.
    pub fn placement(self, method: HttpMethod) -> Placement {
        match self {
            Encoding::Default => match method {
                HttpMethod::Get | HttpMethod::Delete => Placement::Query,
                HttpMethod::Post | HttpMethod::Put => Placement::Form,
            },
            Encoding::HttpBody => Placement::Form,
            Encoding::Json => Placement::Json,
            Encoding::QueryString => Placement::Query,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatch described as plain data.
///
/// Built by `RequestBuilder` from its configuration at call time and passed
/// to `Transport::perform`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub parameters: Option<Parameters>,
    pub encoding: Encoding,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    pub fn placement(&self) -> Placement {
        self.encoding.placement(self.method)
    }
}
