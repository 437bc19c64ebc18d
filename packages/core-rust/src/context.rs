use std::collections::HashMap;

use http::{HeaderMap, Method};
use parking_lot::RwLock;

use crate::types::{Published, Value};

/// Environ key read by the response transform chain. When `true`, no further
/// body transforms run for the request.
pub const TRANSFORM_CHAIN_DISABLE: &str = "rulecache.transformchain.disable";

/// Request-scoped key/value flags shared between operations and the host.
///
/// Operations only receive `&CacheRequest`, so the map uses interior
/// mutability. It is never shared across requests.
#[derive(Debug, Default)]
pub struct Environ {
    entries: RwLock<HashMap<String, Value>>,
}

impl Environ {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.write().insert(key.into(), value.into());
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Whether the transform chain has been told to skip this request.
    #[must_use]
    pub fn transform_chain_disabled(&self) -> bool {
        self.get(TRANSFORM_CHAIN_DISABLE)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Per-request view handed to ruleset lookups and caching operations.
///
/// Built by the host integration from the incoming HTTP request once routing
/// has selected the published resource.
#[derive(Debug)]
pub struct CacheRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Resource chosen by routing. `None` when nothing was published.
    pub published: Option<Published>,
    pub environ: Environ,
}

impl CacheRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            published: None,
            environ: Environ::new(),
        }
    }

    #[must_use]
    pub fn with_published(mut self, published: Published) -> Self {
        self.published = Some(published);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
