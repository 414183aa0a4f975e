//! URL parsing: generic URI decomposition plus request-URL splitting.

mod request;
mod uri;

pub use request::{build_query_map, parse_request_url};
pub use uri::{parse_uri, UriParts, DEFAULT_HOST, DEFAULT_PROTOCOL};
