//! Query filter: an AND-combined regex predicate over collection rows.

use regex::RegexBuilder;
use serde_json::Value;

use crate::engine::types::{EngineError, QueryMap};

/// Filter a collection by a query map.
///
/// Every query value compiles to a regular expression over its parameter's
/// field (string-coerced); a row is kept only when every compiled pattern
/// matches. An empty query map returns the collection unchanged. Never
/// mutates the collection.
pub fn apply_query<'a>(
    collection: &'a [Value],
    query: &QueryMap,
    case_sensitive: bool,
) -> Result<Vec<&'a Value>, EngineError> {
    let mut conditions = Vec::new();
    for (name, values) in query {
        for pattern in values {
            let rx = RegexBuilder::new(pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|e| EngineError::InvalidQuery {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
            conditions.push((name.as_str(), rx));
        }
    }
    if conditions.is_empty() {
        return Ok(collection.iter().collect());
    }

    Ok(collection
        .iter()
        .filter(|row| {
            conditions.iter().all(|(name, rx)| {
                row.get(*name)
                    .map(|field| rx.is_match(&field_to_string(field)))
                    .unwrap_or(false)
            })
        })
        .collect())
}

/// String-coerce a row field for regex matching.
fn field_to_string(field: &Value) -> String {
    match field {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
