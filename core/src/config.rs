//! Request configuration accumulated by `RequestBuilder`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::http::{Encoding, HttpMethod, HttpRequest};

/// Request parameters: string keys mapped to arbitrary JSON values.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// The builder's configuration.
///
/// Defaults: debug on, GET, no parameters, `Encoding::Default`, no headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub debug: bool,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    pub encoding: Encoding,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            debug: true,
            method: HttpMethod::Get,
            parameters: None,
            encoding: Encoding::Default,
            headers: BTreeMap::new(),
        }
    }
}

impl RequestConfig {
    /// Snapshot this configuration into a request for `url`.
    pub fn to_request(&self, url: &str) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: url.to_string(),
            parameters: self.parameters.clone(),
            encoding: self.encoding,
            headers: self.headers.clone(),
        }
    }
}
