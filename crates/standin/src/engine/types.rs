//! Core request/response vocabulary for the engine.
//!
//! `EngineRequest` is what a transport adapter hands the engine;
//! `ResponseDescriptor` is the sole channel by which the engine hands results
//! back. Everything in between (`ParsedUrl`, `RequestInfo`) is transient
//! per-request state.

use async_trait::async_trait;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;

/// Query parameter map: name -> ordered list of raw values.
pub type QueryMap = HashMap<String, Vec<String>>;

/// Request URL split into its engine-relevant parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedUrl {
    /// Leading path segments devoted to reaching the api route,
    /// trailing-slash-terminated (e.g. `"api/"`).
    pub api_base: String,
    /// Collection (or command) name; empty when the path carries none.
    pub collection_name: String,
    /// Item id segment, left as a string; numeric coercion happens later.
    pub id: Option<String>,
    pub query: QueryMap,
    /// Canonical base URL for items of this collection, `/`-terminated.
    pub resource_url: String,
}

/// Resolved item id. Collections whose first element carries a JSON number
/// id are treated as numeric; everything else keeps string ids.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl ItemId {
    /// Compare against the `id` field of a stored item.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ItemId::Number(n) => value.as_i64() == Some(*n),
            ItemId::Text(s) => value.as_str() == Some(s.as_str()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ItemId::Number(n) => Value::from(*n),
            ItemId::Text(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{n}"),
            ItemId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Incoming request as supplied by a transport adapter.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// JSON request body, already decoded by the adapter.
    pub body: Option<Value>,
}

impl EngineRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Per-request bundle handed to every handler and hook.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub url: String,
    pub api_base: String,
    pub collection_name: String,
    /// Resolved id; numeric only when the target collection's ids are known
    /// to be numeric.
    pub id: Option<ItemId>,
    pub query: QueryMap,
    pub resource_url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// Response description produced by every handler.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub url: Option<String>,
}

impl ResponseDescriptor {
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            headers: json_headers(),
            body: None,
            url: Some(url.into()),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Error response carrying a `{"error": message}` body.
    pub fn error(status: StatusCode, url: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(status, url).with_body(serde_json::json!({ "error": message }))
    }
}

/// Human-readable status text; an unknown code is cosmetic only.
pub fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown Status").to_string()
}

/// Default headers for every engine-built response.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

// ============================================================================
// Override Hooks
// ============================================================================

/// Replacement URL parser; returning `None` falls back to the default parser.
pub type UrlParseHook = dyn Fn(&str, &Config) -> Option<ParsedUrl> + Send + Sync;

/// Id-generation override; returning `None` falls back to numeric generation.
pub type GenIdHook = dyn Fn(&[Value], &str) -> Option<Value> + Send + Sync;

/// Per-verb override. A `Some` response fully replaces default handling for
/// that call; `None` means "continue with default handling".
pub type VerbHook = dyn Fn(&RequestInfo, Option<&[Value]>) -> Option<ResponseDescriptor> + Send + Sync;

/// Post-dispatch rewrite of the final response description.
pub type InterceptorHook = dyn Fn(ResponseDescriptor, &RequestInfo) -> ResponseDescriptor + Send + Sync;

/// Optional-callback table supplied at engine construction. Absent entries
/// mean "no override".
#[derive(Default)]
pub struct Hooks {
    pub parse_url: Option<Box<UrlParseHook>>,
    pub gen_id: Option<Box<GenIdHook>>,
    pub get: Option<Box<VerbHook>>,
    pub post: Option<Box<VerbHook>>,
    pub put: Option<Box<VerbHook>>,
    pub delete: Option<Box<VerbHook>>,
    pub response_interceptor: Option<Box<InterceptorHook>>,
}

impl Hooks {
    /// Look up the override for an HTTP verb.
    pub fn for_method(&self, method: &Method) -> Option<&VerbHook> {
        let hook = match *method {
            Method::GET => &self.get,
            Method::POST => &self.post,
            Method::PUT => &self.put,
            Method::DELETE => &self.delete,
            _ => &None,
        };
        hook.as_deref()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("parse_url", &self.parse_url.is_some())
            .field("gen_id", &self.gen_id.is_some())
            .field("get", &self.get.is_some())
            .field("post", &self.post.is_some())
            .field("put", &self.put.is_some())
            .field("delete", &self.delete.is_some())
            .field("response_interceptor", &self.response_interceptor.is_some())
            .finish()
    }
}

// ============================================================================
// Passthrough Transport
// ============================================================================

/// Fallback transport for URLs the engine does not recognize. The engine
/// delegates whole-hog; the transport's response bypasses the engine's
/// response pipeline entirely.
#[async_trait]
pub trait PassthroughTransport: Send + Sync {
    async fn forward(&self, info: &RequestInfo) -> ResponseDescriptor;
}

/// Builds a transport from the live configuration. The engine caches the
/// built transport and rebuilds it after a `commands/config` write.
pub type TransportFactory = dyn Fn(&Config) -> Arc<dyn PassthroughTransport> + Send + Sync;

// ============================================================================
// Error Types
// ============================================================================

/// Failures that are not modeled as ordinary response statuses. The
/// dispatcher converts anything that reaches it into a 500 response.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to parse request url '{url}': {reason}")]
    Parse { url: String, reason: String },
    #[error("collection '{0}' id type is non-numeric; can only generate numeric ids")]
    NonNumericId(String),
    #[error("invalid query pattern '{pattern}': {reason}")]
    InvalidQuery { pattern: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_matches_number() {
        let id = ItemId::Number(42);
        assert!(id.matches(&serde_json::json!(42)));
        assert!(!id.matches(&serde_json::json!(43)));
        assert!(!id.matches(&serde_json::json!("42")));
    }

    #[test]
    fn test_item_id_matches_text() {
        let id = ItemId::Text("abc".to_string());
        assert!(id.matches(&serde_json::json!("abc")));
        assert!(!id.matches(&serde_json::json!("abd")));
        assert!(!id.matches(&serde_json::json!(1)));
    }

    #[test]
    fn test_response_descriptor_status_text() {
        let resp = ResponseDescriptor::new(StatusCode::NOT_FOUND, "api/widgets/9");
        assert_eq!(resp.status_text, "Not Found");
        assert_eq!(
            resp.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_error_response_body_shape() {
        let resp = ResponseDescriptor::error(StatusCode::NOT_FOUND, "api/widgets/9", "missing");
        assert_eq!(resp.body, Some(serde_json::json!({ "error": "missing" })));
    }

    #[test]
    fn test_hooks_for_method() {
        let mut hooks = Hooks::default();
        assert!(hooks.for_method(&Method::GET).is_none());
        hooks.get = Some(Box::new(|_, _| None));
        assert!(hooks.for_method(&Method::GET).is_some());
        assert!(hooks.for_method(&Method::PATCH).is_none());
    }
}
