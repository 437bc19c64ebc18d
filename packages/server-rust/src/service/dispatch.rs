//! Dispatch engine: the two entry points the host calls for every request.
//!
//! - [`CacheDispatcher::intercept`] runs after routing, before the resource
//!   executes, and may claim the response.
//! - [`CacheDispatcher::mutate`] runs just before the response is committed
//!   and edits its headers.
//!
//! Both fetch one settings snapshot, resolve the rule and operation through
//! the registry, tag the response and invoke the operation. Faults are
//! contained here: only a [`ConflictError`] escapes, as
//! [`DispatchError::Conflict`].

use std::sync::Arc;

use rulecache_core::{
    headers::{X_CACHE_OPERATION, X_CACHE_RULE},
    CacheRequest, CacheResponse, ConflictError, Published, RulesetLookup, Settings,
    SettingsSource, TRANSFORM_CHAIN_DISABLE,
};
use tracing::{debug, error, info_span, trace, warn};

use super::config::DispatchConfig;
use super::operation::{DispatchError, Intercepted, Interception};
use super::registry::OperationRegistry;

// ---------------------------------------------------------------------------
// DispatchState
// ---------------------------------------------------------------------------

/// Progress of one entry point invocation, reported at `trace` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    /// A rule was found for the published resource.
    LookedUp,
    /// The resolved operation was invoked.
    Dispatched,
    /// The interceptor claimed the response.
    Aborted,
    /// A non-conflict fault was logged and suppressed.
    ErrorSwallowed,
}

/// What one invocation has found so far, for state tracing and fault logs.
#[derive(Debug)]
struct Progress {
    hook: &'static str,
    state: DispatchState,
    rule: Option<String>,
    operation: Option<String>,
}

impl Progress {
    fn new(hook: &'static str) -> Self {
        Self {
            hook,
            state: DispatchState::Idle,
            rule: None,
            operation: None,
        }
    }

    fn advance(&mut self, next: DispatchState) {
        trace!(hook = self.hook, from = ?self.state, to = ?next, "dispatch state");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// CacheDispatcher
// ---------------------------------------------------------------------------

/// Resolves and invokes caching operations for requests.
pub struct CacheDispatcher {
    settings: Arc<dyn SettingsSource>,
    lookup: Arc<dyn RulesetLookup>,
    registry: Arc<OperationRegistry>,
    config: DispatchConfig,
}

impl CacheDispatcher {
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        lookup: Arc<dyn RulesetLookup>,
        registry: Arc<OperationRegistry>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            settings,
            lookup,
            registry,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Post-traversal hook: gives the mapped interceptor a chance to claim
    /// the response before the resource runs.
    ///
    /// On [`Interception::Abort`] the response status is locked and the
    /// transform chain is disabled for the request, unless the operation
    /// already chose a value for that flag.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Conflict`] when the lookup or the operation
    /// raised a [`ConflictError`]. The host must retry the request.
    pub fn intercept(
        &self,
        request: &CacheRequest,
        response: &mut CacheResponse,
    ) -> Result<Interception, DispatchError> {
        let Some(published) = request.published.as_ref() else {
            return Ok(Interception::Continue);
        };
        let span = info_span!("cache_dispatch", hook = "intercept", resource = %published);
        let _guard = span.enter();

        let snapshot = self.settings.snapshot();
        let mut progress = Progress::new("intercept");
        let result = self.try_intercept(
            snapshot.as_deref(),
            published,
            request,
            response,
            &mut progress,
        );
        isolate(result, published, &mut progress, Interception::Continue)
    }

    /// Pre-commit hook: lets the mapped mutator edit the final headers.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Conflict`] when the lookup or the operation
    /// raised a [`ConflictError`]. The host must retry the request.
    pub fn mutate(
        &self,
        request: &CacheRequest,
        response: &mut CacheResponse,
    ) -> Result<(), DispatchError> {
        let Some(published) = request.published.as_ref() else {
            return Ok(());
        };
        let span = info_span!("cache_dispatch", hook = "mutate", resource = %published);
        let _guard = span.enter();

        let snapshot = self.settings.snapshot();
        let mut progress = Progress::new("mutate");
        let result = self.try_mutate(
            snapshot.as_deref(),
            published,
            request,
            response,
            &mut progress,
        );
        isolate(result, published, &mut progress, ())
    }

    fn try_intercept(
        &self,
        settings: Option<&Settings>,
        published: &Published,
        request: &CacheRequest,
        response: &mut CacheResponse,
        progress: &mut Progress,
    ) -> anyhow::Result<Interception> {
        let resolution =
            self.registry
                .resolve_interceptor(settings, self.lookup.as_ref(), published, request)?;

        let Some(rule) = resolution.rule else {
            return Ok(Interception::Continue);
        };
        progress.rule = Some(rule.clone());
        progress.operation.clone_from(&resolution.operation);
        progress.advance(DispatchState::LookedUp);
        tag(response, X_CACHE_RULE, &rule);

        let (Some(name), Some(operation)) = (resolution.operation, resolution.instance) else {
            return Ok(Interception::Continue);
        };
        tag(response, X_CACHE_OPERATION, &name);

        progress.advance(DispatchState::Dispatched);
        let Some(body) = operation.intercept_response(&rule, response)? else {
            return Ok(Interception::Continue);
        };

        let status = response
            .explicit_status()
            .unwrap_or(self.config.abort_status);
        response.lock_status(status);
        if !request.environ.contains(TRANSFORM_CHAIN_DISABLE) {
            request.environ.set(TRANSFORM_CHAIN_DISABLE, true);
        }
        progress.advance(DispatchState::Aborted);
        debug!(rule = %rule, operation = %name, status = status.as_u16(), "response intercepted");

        Ok(Interception::Abort(Intercepted {
            status,
            headers: response.headers().clone(),
            body,
        }))
    }

    fn try_mutate(
        &self,
        settings: Option<&Settings>,
        published: &Published,
        request: &CacheRequest,
        response: &mut CacheResponse,
        progress: &mut Progress,
    ) -> anyhow::Result<()> {
        let resolution =
            self.registry
                .resolve_mutator(settings, self.lookup.as_ref(), published, request)?;

        let Some(rule) = resolution.rule else {
            return Ok(());
        };
        progress.rule = Some(rule.clone());
        progress.operation.clone_from(&resolution.operation);
        progress.advance(DispatchState::LookedUp);
        tag(response, X_CACHE_RULE, &rule);

        let (Some(name), Some(operation)) = (resolution.operation, resolution.instance) else {
            return Ok(());
        };
        tag(response, X_CACHE_OPERATION, &name);

        progress.advance(DispatchState::Dispatched);
        operation.modify_response(&rule, response)
    }
}

/// Sets a tagging header. A value that is not a valid header (a custom
/// lookup returning a rule name with control characters) is logged and left
/// out, and the operation still runs.
fn tag(response: &mut CacheResponse, header: &str, value: &str) {
    if let Err(err) = response.set_header(header, value) {
        warn!(header, value = ?value, error = %err, "cannot tag response");
    }
}

/// Converts an entry point result: conflicts escape, anything else is logged
/// and replaced by `fallback`.
fn isolate<T>(
    result: anyhow::Result<T>,
    published: &Published,
    progress: &mut Progress,
    fallback: T,
) -> Result<T, DispatchError> {
    let err = match result {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if let Some(conflict) = ConflictError::find(&err) {
        warn!(
            resource = %published,
            rule = ?progress.rule,
            operation = ?progress.operation,
            reason = %conflict.reason,
            "conflict during caching operation, request must be retried"
        );
        return Err(DispatchError::Conflict(conflict.clone()));
    }

    error!(
        resource = %published,
        rule = ?progress.rule,
        operation = ?progress.operation,
        error = %format!("{err:#}"),
        "caching operation failed, ignoring"
    );
    progress.advance(DispatchState::ErrorSwallowed);
    Ok(fallback)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
