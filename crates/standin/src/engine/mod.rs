//! The engine: an instance-scoped context owning the store, configuration,
//! readiness gate and hook table, plus the top-level request dispatch
//! pipeline.
//!
//! Pipeline per request: readiness wait -> URL parse -> request bundle ->
//! (command | verb override | CRUD | passthrough | not-found). Everything
//! except commands and passthrough is delivered through the simulated
//! latency stage. Anything unexpected that escapes a handler is downgraded to a
//! 500 response; no internal failure ever propagates to the caller.

mod commands;
mod crud;
pub mod types;

use futures::FutureExt;
use hyper::{Method, StatusCode};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::latency::with_delay;
use crate::readiness::ReadinessGate;
use crate::store::{self, SeedData, SeedRequest, Store};
use crate::url::parse_request_url;

pub use types::{EngineRequest, RequestInfo, ResponseDescriptor};
use types::{EngineError, Hooks, ItemId, ParsedUrl, PassthroughTransport, TransportFactory};

// A commands request is recognized by its api base, e.g. `commands/resetdb`.
static COMMANDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)commands/?$").expect("commands regex"));

/// The mock backend engine. One instance owns one store; independent
/// instances cannot interfere.
pub struct Engine {
    config: RwLock<Config>,
    store: Arc<RwLock<Store>>,
    gate: ReadinessGate,
    seed: Arc<dyn SeedData>,
    hooks: Hooks,
    transport_factory: Option<Box<TransportFactory>>,
    /// Built lazily; invalidated when `commands/config` writes settings.
    transport: Mutex<Option<Arc<dyn PassthroughTransport>>>,
}

impl Engine {
    pub fn new(seed: Arc<dyn SeedData>) -> Self {
        Self {
            config: RwLock::new(Config::default()),
            store: Arc::new(RwLock::new(Store::default())),
            gate: ReadinessGate::new(),
            seed,
            hooks: Hooks::default(),
            transport_factory: None,
            transport: Mutex::new(None),
        }
    }

    pub fn with_config(self, config: Config) -> Self {
        *self.config.write() = config;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_transport_factory(mut self, factory: Box<TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    /// Snapshot of the live configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Apply a partial configuration patch and drop the cached passthrough
    /// transport so it is rebuilt with the new settings.
    pub(crate) fn patch_config(&self, patch: &Value) -> Result<(), serde_json::Error> {
        self.config.write().merge(patch)?;
        *self.transport.lock() = None;
        Ok(())
    }

    /// Discard the store and reseed it, waiting until readiness is restored.
    pub async fn reset_db(&self, req: Option<SeedRequest>) {
        self.gate.invalidate();
        self.ensure_ready(req).await;
    }

    fn ensure_ready(&self, req: Option<SeedRequest>) -> impl std::future::Future<Output = ()> {
        let store = Arc::clone(&self.store);
        let seed = Arc::clone(&self.seed);
        self.gate.ready(move || {
            async move {
                let collections = seed.create_db(req).await;
                debug!("store initialized with {} collection(s)", collections.len());
                store.write().replace(collections);
            }
            .boxed()
        })
    }

    /// Handle one request, always producing a well-formed response.
    pub async fn handle(&self, request: EngineRequest) -> ResponseDescriptor {
        match self.handle_inner(&request).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("request to '{}' failed: {e}", request.url);
                ResponseDescriptor::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &request.url,
                    e.to_string(),
                )
            }
        }
    }

    async fn handle_inner(
        &self,
        request: &EngineRequest,
    ) -> Result<ResponseDescriptor, EngineError> {
        self.ensure_ready(None).await;

        let config = self.config();
        let parsed = self.parse_url(&request.url, &config)?;
        let info = self.request_info(request, parsed);

        if COMMANDS_RE.is_match(&info.api_base) {
            // Commands bypass latency simulation.
            return Ok(commands::handle_command(self, &info).await);
        }

        let delay = Duration::from_millis(config.delay);

        if let Some(hook) = self.hooks.for_method(&info.method) {
            let overridden = {
                let store = self.store.read();
                let collection = store.collection(&info.collection_name).map(Vec::as_slice);
                hook(&info, collection)
            };
            if let Some(resp) = overridden {
                // The override replaces default handling but its response is
                // still delivered through the latency stage.
                debug!("{} {} handled by verb override", info.method, info.url);
                return Ok(with_delay(delay, std::future::ready(resp)).await);
            }
        }

        if config.pass_thru_unknown_url && !self.store.read().has_collection(&info.collection_name)
        {
            if let Some(transport) = self.transport(&config) {
                info!("passing '{}' through to the fallback transport", info.url);
                // Delegation is whole-hog: no latency stage, no interceptor.
                return Ok(transport.forward(&info).await);
            }
            warn!("passThruUnknownUrl is set but no transport factory was supplied");
        }

        with_delay(delay, std::future::ready(self.dispatch(&info, &config))).await
    }

    fn dispatch(
        &self,
        info: &RequestInfo,
        config: &Config,
    ) -> Result<ResponseDescriptor, EngineError> {
        let crud_resp = {
            let mut store = self.store.write();
            match store.collection_mut(&info.collection_name) {
                Some(collection) => Some(self.crud(info, collection, config)?),
                None => None,
            }
        };
        let resp = match crud_resp {
            Some(resp) => resp,
            None => ResponseDescriptor::error(
                StatusCode::NOT_FOUND,
                &info.url,
                format!("Collection '{}' not found", info.collection_name),
            ),
        };
        Ok(self.intercept(resp, info))
    }

    fn crud(
        &self,
        info: &RequestInfo,
        collection: &mut Vec<Value>,
        config: &Config,
    ) -> Result<ResponseDescriptor, EngineError> {
        match info.method {
            Method::GET => crud::get(info, collection, config),
            Method::POST => crud::post(info, collection, config, self.hooks.gen_id.as_deref()),
            Method::PUT => Ok(crud::put(info, collection, config)),
            Method::DELETE => Ok(crud::delete(info, collection, config)),
            _ => Ok(ResponseDescriptor::error(
                StatusCode::METHOD_NOT_ALLOWED,
                &info.url,
                format!("Method '{}' is not supported", info.method),
            )),
        }
    }

    fn parse_url(&self, url: &str, config: &Config) -> Result<ParsedUrl, EngineError> {
        if let Some(hook) = &self.hooks.parse_url {
            if let Some(parsed) = hook(url, config) {
                return Ok(parsed);
            }
        }
        parse_request_url(url, config)
    }

    fn request_info(&self, request: &EngineRequest, parsed: ParsedUrl) -> RequestInfo {
        let id = parsed
            .id
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| self.parse_id(&parsed.collection_name, raw));

        RequestInfo {
            method: request.method.clone(),
            url: request.url.clone(),
            api_base: parsed.api_base,
            collection_name: parsed.collection_name,
            id,
            query: parsed.query,
            resource_url: parsed.resource_url,
            headers: types::json_headers(),
            body: request.body.clone(),
        }
    }

    /// Numeric coercion is attempted only when the target collection's ids
    /// are known to be numeric.
    fn parse_id(&self, collection_name: &str, raw: &str) -> ItemId {
        let numeric = self
            .store
            .read()
            .collection(collection_name)
            .map(|c| store::id_is_numeric(c))
            .unwrap_or(false);
        if numeric {
            raw.parse::<i64>()
                .map(ItemId::Number)
                .unwrap_or_else(|_| ItemId::Text(raw.to_string()))
        } else {
            ItemId::Text(raw.to_string())
        }
    }

    fn intercept(&self, resp: ResponseDescriptor, info: &RequestInfo) -> ResponseDescriptor {
        match &self.hooks.response_interceptor {
            Some(hook) => hook(resp, info),
            None => resp,
        }
    }

    fn transport(&self, config: &Config) -> Option<Arc<dyn PassthroughTransport>> {
        let factory = self.transport_factory.as_ref()?;
        let mut slot = self.transport.lock();
        Some(Arc::clone(slot.get_or_insert_with(|| factory(config))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StaticSeed;
    use serde_json::json;
    use std::collections::HashMap;

    fn engine() -> Engine {
        let seed = StaticSeed::new(HashMap::from([(
            "widgets".to_string(),
            vec![json!({"id": 1, "name": "wrench"})],
        )]));
        Engine::new(Arc::new(seed)).with_config(Config {
            delay: 0,
            ..Config::default()
        })
    }

    #[test]
    fn test_commands_api_base_detection() {
        assert!(COMMANDS_RE.is_match("commands/"));
        assert!(COMMANDS_RE.is_match("commands"));
        assert!(COMMANDS_RE.is_match("COMMANDS/"));
        assert!(!COMMANDS_RE.is_match("api/"));
        assert!(!COMMANDS_RE.is_match("commands/extra/"));
    }

    #[tokio::test]
    async fn test_numeric_id_coercion_follows_collection_type() {
        let engine = engine();
        engine.ensure_ready(None).await;
        assert_eq!(engine.parse_id("widgets", "42"), ItemId::Number(42));
        assert_eq!(
            engine.parse_id("unknown", "42"),
            ItemId::Text("42".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_collection_is_404() {
        let engine = engine();
        let resp = engine
            .handle(EngineRequest::new(Method::GET, "api/gadgets"))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(
            resp.body,
            Some(json!({"error": "Collection 'gadgets' not found"}))
        );
    }
}
