//! Request URL parsing.
//!
//! Splits a request URL into `{apiBase, collectionName, id, query,
//! resourceUrl}` using the generic URI decomposition plus configuration.
//! Only the segment *count* of a configured `apiBase` matters; its literal
//! characters are irrelevant.

use crate::config::Config;
use crate::engine::types::{EngineError, ParsedUrl, QueryMap};
use crate::url::uri::{self, DEFAULT_HOST};

/// Parse a request URL under the given configuration.
pub fn parse_request_url(url: &str, config: &Config) -> Result<ParsedUrl, EngineError> {
    let loc = uri::parse_uri(url)?;

    let config_host = config.host.as_deref().unwrap_or(DEFAULT_HOST);
    let mut url_root = String::new();
    let mut drop = config.root_path.len();
    if loc.host != config_host {
        // Cross-origin request: assume its collections actually live here
        // too. Keep everything past the leading slash and remember the
        // foreign origin for the resource URL.
        drop = 1;
        url_root = format!("{}://{}/", loc.protocol, loc.host);
    }
    let path = loc.path.get(drop..).unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // The api base consumes leading segments. Without a configured apiBase
    // the first segment is taken verbatim; with one, only its segment count
    // is honored.
    let mut ix;
    let api_base = match &config.api_base {
        None => {
            ix = 1;
            format!("{}/", segments.first().copied().unwrap_or(""))
        }
        Some(configured) => {
            let trimmed = configured.trim().trim_end_matches('/');
            // An empty apiBase consumes nothing; unwise but allowed.
            ix = if trimmed.is_empty() {
                0
            } else {
                trimmed.split('/').count()
            };
            format!("{trimmed}/")
        }
    };

    // Collection name: next segment, with any `.json`-style suffix dropped.
    let collection_name = segments
        .get(ix)
        .and_then(|s| s.split('.').next())
        .unwrap_or("")
        .to_string();
    ix += 1;

    let id = segments.get(ix).map(|s| s.to_string());
    let query = loc
        .query
        .as_deref()
        .map(build_query_map)
        .unwrap_or_default();
    let resource_url = format!("{url_root}{api_base}{collection_name}/");

    Ok(ParsedUrl {
        api_base,
        collection_name,
        id,
        query,
        resource_url,
    })
}

/// Build the query map from a raw query string, URL-decoding both keys and
/// values. Repeated names accumulate values in order.
pub fn build_query_map(query: &str) -> QueryMap {
    let mut map = QueryMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).unwrap_or_default().into_owned();
        let value = urlencoding::decode(value).unwrap_or_default().into_owned();
        map.entry(key).or_default().push(value);
    }
    map
}
