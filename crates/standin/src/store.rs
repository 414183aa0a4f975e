//! The in-memory collection store, id generation, and seed sources.

use async_trait::async_trait;
use hyper::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

use crate::engine::types::{EngineError, GenIdHook};

/// Named collections of items, as produced by a seed source.
pub type Collections = HashMap<String, Vec<Value>>;

/// The mutable collection store. Owned exclusively by one engine instance;
/// replaced wholesale on reset, mutated in place by CRUD operations.
#[derive(Debug, Default)]
pub struct Store {
    collections: Collections,
}

impl Store {
    pub fn new(collections: Collections) -> Self {
        Self { collections }
    }

    /// Replace every collection, discarding previous contents.
    pub fn replace(&mut self, collections: Collections) {
        self.collections = collections;
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn collection(&self, name: &str) -> Option<&Vec<Value>> {
        self.collections.get(name)
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        self.collections.get_mut(name)
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

/// Whether a collection's id type is numeric, auto-detected from the first
/// element. Empty collections are treated as non-numeric by default.
pub fn id_is_numeric(collection: &[Value]) -> bool {
    collection
        .first()
        .and_then(|item| item.get("id"))
        .map(Value::is_number)
        .unwrap_or(false)
}

/// Compute the next id for a collection.
///
/// An override hook wins when it returns a value. Otherwise the collection's
/// ids must be numeric: the result is one plus the maximum id observed, and
/// an empty collection starts at 1. A non-empty collection with non-numeric
/// ids is a tagged failure, not a panic.
pub fn next_id(
    collection: &[Value],
    collection_name: &str,
    gen_id: Option<&GenIdHook>,
) -> Result<Value, EngineError> {
    if let Some(hook) = gen_id {
        if let Some(id) = hook(collection, collection_name) {
            return Ok(id);
        }
    }
    if !collection.is_empty() && !id_is_numeric(collection) {
        return Err(EngineError::NonNumericId(collection_name.to_string()));
    }
    let max_id = collection
        .iter()
        .filter_map(|item| item.get("id").and_then(Value::as_i64))
        .max()
        .unwrap_or(0);
    Ok(Value::from(max_id + 1))
}

// ============================================================================
// Seed Sources
// ============================================================================

/// Snapshot of the request that triggered a reseed, forwarded to the seed
/// source on `commands/resetdb`.
#[derive(Debug, Clone)]
pub struct SeedRequest {
    pub method: Method,
    pub url: String,
}

/// User-supplied provider of the named collections. Implementations may be
/// synchronous or genuinely asynchronous; the engine normalizes both behind
/// this trait.
#[async_trait]
pub trait SeedData: Send + Sync {
    async fn create_db(&self, req: Option<SeedRequest>) -> Collections;
}

/// Seed source backed by a literal collection map.
#[derive(Debug, Clone, Default)]
pub struct StaticSeed {
    collections: Collections,
}

impl StaticSeed {
    pub fn new(collections: Collections) -> Self {
        Self { collections }
    }
}

#[async_trait]
impl SeedData for StaticSeed {
    async fn create_db(&self, _req: Option<SeedRequest>) -> Collections {
        self.collections.clone()
    }
}

/// Seed source that loads a JSON file mapping collection names to arrays of
/// items. A load failure is logged and yields an empty store.
#[derive(Debug, Clone)]
pub struct JsonFileSeed {
    path: PathBuf,
}

impl JsonFileSeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Collections, anyhow::Error> {
        use anyhow::Context;
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read seed file {}", self.path.display()))?;
        let collections: Collections = serde_json::from_str(&contents)
            .with_context(|| format!("seed file {} is not a collection map", self.path.display()))?;
        Ok(collections)
    }
}

#[async_trait]
impl SeedData for JsonFileSeed {
    async fn create_db(&self, _req: Option<SeedRequest>) -> Collections {
        match self.load().await {
            Ok(collections) => collections,
            Err(e) => {
                warn!("seed load failed, starting with an empty store: {e:#}");
                Collections::new()
            }
        }
    }
}
