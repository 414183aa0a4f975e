//! In-memory mock REST backend.
//!
//! Intercepts HTTP-style requests aimed at a configurable api base and
//! answers them from an in-memory collection store: REST-ish URL parsing,
//! per-collection CRUD with configurable policy outcomes, regex query
//! filtering, simulated latency, command endpoints for resetting and
//! reconfiguring the live instance, and optional passthrough of unknown
//! URLs to a caller-supplied fallback transport.
//!
//! The embeddable surface is [`Engine`]; [`MockServer`] fronts an engine
//! with a real hyper http1 listener for out-of-process use.

// ===== Core engine modules =====
pub mod config;
pub mod engine;
pub mod query;
pub mod store;
pub mod url;

// ===== Serving and timing =====
pub mod adapter;
pub mod latency;
pub mod readiness;

pub use adapter::MockServer;
pub use config::Config;
pub use engine::types::{
    EngineError, GenIdHook, Hooks, InterceptorHook, ItemId, ParsedUrl, PassthroughTransport,
    QueryMap, TransportFactory, UrlParseHook, VerbHook,
};
pub use engine::{Engine, EngineRequest, RequestInfo, ResponseDescriptor};
pub use store::{Collections, JsonFileSeed, SeedData, SeedRequest, StaticSeed, Store};
