use bytes::Bytes;

use crate::context::CacheRequest;
use crate::response::CacheResponse;
use crate::types::Published;

/// A caching operation: sets response headers and/or claims the response.
///
/// Both capabilities have no-op defaults so an operation implements only what
/// it needs. Instances are created per request, bound to the published
/// resource and request they were resolved for.
pub trait CachingOperation {
    /// Intercepts the response if appropriate.
    ///
    /// Return `Ok(None)` to let the request continue normally. Return a body
    /// to abort normal processing and send that body instead; for a plain 304
    /// an empty body is enough. The operation may set the status and headers
    /// on `response`, but must not try to produce the resource's own body.
    ///
    /// # Errors
    ///
    /// Any error is logged and ignored by the dispatcher, except a
    /// [`ConflictError`](crate::ConflictError), which is propagated.
    fn intercept_response(
        &self,
        _rule: &str,
        _response: &mut CacheResponse,
    ) -> anyhow::Result<Option<Bytes>> {
        Ok(None)
    }

    /// Modifies the final response headers. Must not touch the body.
    ///
    /// # Errors
    ///
    /// Same handling as [`CachingOperation::intercept_response`].
    fn modify_response(&self, _rule: &str, _response: &mut CacheResponse) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Maps a published resource to the name of its caching rule.
///
/// Called on every request, so implementations must be cheap and free of side
/// effects. The request is available for lookups that need to tell apart
/// resources of the same kind.
pub trait RulesetLookup: Send + Sync {
    /// Returns the rule name, or `None` if no rule applies.
    ///
    /// # Errors
    ///
    /// Custom lookups may fail; the dispatcher logs and ignores the failure
    /// unless it is a [`ConflictError`](crate::ConflictError).
    fn lookup(&self, published: &Published, request: &CacheRequest)
        -> anyhow::Result<Option<String>>;
}
