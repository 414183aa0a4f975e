//! Engine configuration.
//!
//! A flat set of options controlling response and policy behavior. Built once
//! at engine creation from defaults merged with caller overrides; mutable at
//! runtime through the `commands/config` write path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration options for the engine.
///
/// Policy flags select between two defined status-code behaviors for an edge
/// case (e.g. `put404` chooses 404 over create-on-PUT).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Path prefix preceding the collection name. Only the number of
    /// `/`-separated segments matters; the literal characters are irrelevant.
    /// `None` means "consume exactly one leading segment".
    pub api_base: Option<String>,
    /// Case sensitivity of query regex matching.
    pub case_sensitive_search: bool,
    /// Wrap response bodies in a `{ "data": ... }` envelope.
    pub data_encapsulation: bool,
    /// Simulated latency in milliseconds; 0 disables the delay entirely.
    pub delay: u64,
    /// DELETE of a missing item responds 404 instead of 204.
    #[serde(rename = "delete404")]
    pub delete_404: bool,
    /// Host this engine pretends to serve; URLs on a different host are
    /// treated as cross-origin. `None` falls back to the default authority.
    pub host: Option<String>,
    /// Delegate unrecognized URLs to the fallback transport.
    pub pass_thru_unknown_url: bool,
    /// POST replacing an existing item responds 204 instead of 200.
    #[serde(rename = "post204")]
    pub post_204: bool,
    /// POST to an existing id is a 409 conflict instead of an upsert.
    #[serde(rename = "post409")]
    pub post_409: bool,
    /// PUT replacing an existing item responds 204 instead of 200.
    #[serde(rename = "put204")]
    pub put_204: bool,
    /// PUT of a missing item responds 404 instead of creating it.
    #[serde(rename = "put404")]
    pub put_404: bool,
    /// Path prefix stripped before URL segmenting, slash-terminated.
    pub root_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: None,
            case_sensitive_search: false,
            data_encapsulation: false,
            delay: 500,
            delete_404: false,
            host: None,
            pass_thru_unknown_url: false,
            post_204: true,
            post_409: false,
            put_204: true,
            put_404: false,
            root_path: "/".to_string(),
        }
    }
}

impl Config {
    /// Apply a partial JSON patch over the live configuration, keeping
    /// untouched fields as they are. Unknown keys in the patch are ignored
    /// by the round-trip.
    pub fn merge(&mut self, patch: &Value) -> Result<(), serde_json::Error> {
        let mut current = serde_json::to_value(&*self)?;
        if let (Some(fields), Some(patch)) = (current.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        *self = serde_json::from_value(current)?;
        Ok(())
    }
}
