//! Administrative command endpoints: `commands/resetdb` and
//! `commands/config`. Command responses bypass latency simulation.

use hyper::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::types::{RequestInfo, ResponseDescriptor};
use crate::engine::Engine;
use crate::store::SeedRequest;

/// Dispatch a commands request. The collection-name slot carries the command
/// name.
pub(crate) async fn handle_command(engine: &Engine, info: &RequestInfo) -> ResponseDescriptor {
    let command = info.collection_name.to_lowercase();
    debug!("command '{}' ({})", command, info.method);
    match command.as_str() {
        "resetdb" => {
            // Any verb resets; respond once readiness is restored.
            engine
                .reset_db(Some(SeedRequest {
                    method: info.method.clone(),
                    url: info.url.clone(),
                }))
                .await;
            info!("store reseeded via commands/resetdb");
            ResponseDescriptor::new(StatusCode::NO_CONTENT, &info.url)
        }
        "config" if info.method == Method::GET => {
            let config = engine.config();
            let body = serde_json::to_value(config).unwrap_or(Value::Null);
            ResponseDescriptor::new(StatusCode::OK, &info.url).with_body(body)
        }
        "config" => {
            // Any non-GET verb merges the body into the live configuration.
            if let Some(patch) = &info.body {
                if let Err(e) = engine.patch_config(patch) {
                    warn!("rejected config patch: {e}");
                    return ResponseDescriptor::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &info.url,
                        format!("invalid config patch: {e}"),
                    );
                }
            }
            ResponseDescriptor::new(StatusCode::NO_CONTENT, &info.url)
        }
        _ => ResponseDescriptor::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &info.url,
            format!("Unknown command \"{command}\""),
        ),
    }
}
