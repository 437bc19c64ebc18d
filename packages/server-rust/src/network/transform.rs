//! Response body transforms applied after the resource has run.
//!
//! The chain is skipped entirely for a request whose environ carries
//! `rulecache.transformchain.disable = true`, which the dispatcher sets when
//! an interceptor claims the response.

use std::sync::Arc;

use bytes::Bytes;
use rulecache_core::CacheRequest;
use tracing::warn;

/// One body transform step.
pub trait Transform: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Position in the chain; lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// Rewrites the response body.
    ///
    /// # Errors
    ///
    /// A failing step is logged and its input is passed on unchanged.
    fn transform(&self, request: &CacheRequest, body: Bytes) -> anyhow::Result<Bytes>;
}

/// Ordered list of [`Transform`] steps.
#[derive(Clone, Default)]
pub struct TransformChain {
    steps: Vec<Arc<dyn Transform>>,
}

impl TransformChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step, keeping the chain sorted by [`Transform::order`]. Steps
    /// with equal order run in insertion order.
    #[must_use]
    pub fn with(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self.steps.sort_by_key(|step| step.order());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain would change anything for `request`.
    #[must_use]
    pub fn applies_to(&self, request: &CacheRequest) -> bool {
        !self.is_empty() && !request.environ.transform_chain_disabled()
    }

    /// Runs every step over `body`.
    #[must_use]
    pub fn apply(&self, request: &CacheRequest, body: Bytes) -> Bytes {
        if request.environ.transform_chain_disabled() {
            return body;
        }
        self.steps.iter().fold(body, |body, step| {
            match step.transform(request, body.clone()) {
                Ok(transformed) => transformed,
                Err(err) => {
                    warn!(transform = step.name(), error = %format!("{err:#}"), "transform failed, passing body through");
                    body
                }
            }
        })
    }
}
