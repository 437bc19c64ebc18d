//! Types shared by the operation registry, the chain and the dispatcher.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use rulecache_core::{CacheRequest, CachingOperation, ConflictError, Published, Settings};

use super::registry::OperationRegistry;

/// Capability an operation is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Edits response headers before the response is committed.
    Mutator,
    /// May claim the response before the resource runs.
    Interceptor,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Mutator, Capability::Interceptor];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mutator => "mutator",
            Self::Interceptor => "interceptor",
        }
    }
}

/// Everything an operation factory may bind an operation instance to.
///
/// `settings` is the snapshot taken by the current dispatch entry point, and
/// `registry` lets composite operations resolve further operations by name.
#[derive(Clone, Copy)]
pub struct OperationContext<'a> {
    pub published: &'a Published,
    pub request: &'a CacheRequest,
    pub settings: Option<&'a Settings>,
    pub registry: &'a OperationRegistry,
    /// Number of composite operations enclosing this one. `0` at dispatch.
    pub depth: usize,
}

/// Outcome of resolving the operation for a request.
///
/// Each stage fills in one more field: no rule leaves everything empty, a
/// rule without a mapping sets only `rule`, a mapped name without a usable
/// factory sets `rule` and `operation`.
#[derive(Default)]
pub struct Resolution<'a> {
    pub rule: Option<String>,
    pub operation: Option<String>,
    pub instance: Option<Box<dyn CachingOperation + 'a>>,
}

impl std::fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("rule", &self.rule)
            .field("operation", &self.operation)
            .field("resolved", &self.instance.is_some())
            .finish()
    }
}

/// A response claimed by an interceptor.
///
/// Carries the locked status, the headers set so far, and the body to send in
/// place of the resource's own output.
#[derive(Debug, Clone)]
pub struct Intercepted {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Result of the intercept entry point.
#[derive(Debug)]
pub enum Interception {
    /// Let the request proceed normally.
    Continue,
    /// Stop normal processing and send the intercepted response.
    Abort(Intercepted),
}

impl Interception {
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort(_))
    }
}

/// Errors that escape the dispatch entry points.
///
/// Only the retryable conflict is ever returned: every other fault is logged
/// and suppressed inside the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unit of work must be retried: {0}")]
    Conflict(#[from] ConflictError),
}
