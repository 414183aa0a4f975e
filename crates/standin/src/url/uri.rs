//! Generic URI decomposition.
//!
//! Splits a raw URL into protocol, host, path and query parts. Relative URLs
//! are tolerated by synthesizing the default scheme and authority.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::types::EngineError;

/// Authority assumed for relative URLs and for an unset `host` config.
pub const DEFAULT_HOST: &str = "localhost";

/// Scheme assumed for relative URLs.
pub const DEFAULT_PROTOCOL: &str = "http";

// RFC 3986 appendix-B style decomposition, anchored.
static URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z][A-Za-z0-9+.\-]*):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#.*)?$")
        .expect("uri grammar regex")
});

/// URL parts relevant to request routing.
#[derive(Debug, Clone, PartialEq)]
pub struct UriParts {
    pub protocol: String,
    pub host: String,
    /// Always `/`-prefixed.
    pub path: String,
    pub query: Option<String>,
}

/// Decompose a raw URL string.
///
/// Fails with a descriptive [`EngineError::Parse`] when the input cannot
/// match the grammar; the dispatcher catches that and answers 500.
pub fn parse_uri(url: &str) -> Result<UriParts, EngineError> {
    let caps = URI_RE.captures(url).ok_or_else(|| EngineError::Parse {
        url: url.to_string(),
        reason: "url does not match the uri grammar".to_string(),
    })?;

    let protocol = caps
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
    let host = caps
        .get(2)
        .map(|m| m.as_str())
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOST)
        .to_string();
    let mut path = caps.get(3).map(|m| m.as_str()).unwrap_or("").to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    let query = caps.get(4).map(|m| m.as_str().to_string());

    Ok(UriParts {
        protocol,
        host,
        path,
        query,
    })
}
