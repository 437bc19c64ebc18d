//! Composite operation running a configured list of operations in order.

use bytes::Bytes;
use rulecache_core::{
    headers::X_CACHE_CHAIN_OPERATIONS, lookup_option, CacheResponse, CachingOperation,
    OperationType, Value,
};
use tracing::{debug, warn};

use super::operation::{Capability, OperationContext};
use super::registry::{boxed, OperationRegistry};

/// Runs the operations named by the `operations` option, in configuration
/// order, resolving each name through the registry at invocation time.
///
/// On intercept the first sub-operation that produces a body wins. On modify
/// every sub-operation runs. Names that do not resolve are skipped silently,
/// and the names actually invoked are reported in `X-Cache-Chain-Operations`.
///
/// Sub-operations see the context one level deeper. A chain nested
/// [`Chain::MAX_DEPTH`] levels deep runs nothing, which bounds chains that
/// reach themselves through another registered name.
pub struct Chain<'a> {
    ctx: OperationContext<'a>,
}

impl<'a> Chain<'a> {
    pub const NAME: &'static str = "rulecache.operations.chain";
    pub const PREFIX: &'static str = "rulecache.operations.chain";
    pub const OPTION: &'static str = "operations";
    pub const MAX_DEPTH: usize = 8;

    #[must_use]
    pub fn new(ctx: OperationContext<'a>) -> Self {
        Self { ctx }
    }

    /// Descriptor registered alongside the chain factory.
    #[must_use]
    pub fn operation_type() -> OperationType {
        OperationType::new(Self::NAME, "Chain")
            .with_description("Allows multiple operations to be chained together")
            .with_prefix(Self::PREFIX)
            .with_options([Self::OPTION])
    }

    /// Registers the chain factory and descriptor for both capabilities.
    pub fn register(registry: &OperationRegistry) {
        registry.register_operation(Self::NAME, |ctx| boxed(Chain::new(ctx)));
        registry.register_type(Self::operation_type());
    }

    fn operation_names(&self, rule: &str) -> Vec<String> {
        if self.ctx.depth >= Self::MAX_DEPTH {
            warn!(rule = %rule, depth = self.ctx.depth, "chain nested too deeply, skipping");
            return Vec::new();
        }
        let configured = lookup_option(
            self.ctx.settings,
            Self::PREFIX,
            Some(rule),
            Self::OPTION,
            Value::Array(Vec::new()),
        );
        configured
            .as_str_list()
            .into_iter()
            .filter(|name| *name != Self::NAME)
            .map(str::to_string)
            .collect()
    }

    fn resolve(&self, capability: Capability, name: &str) -> Option<Box<dyn CachingOperation + 'a>> {
        let ctx = OperationContext {
            depth: self.ctx.depth + 1,
            ..self.ctx
        };
        let operation = self.ctx.registry.resolve(capability, ctx, name);
        if operation.is_none() {
            debug!(operation = %name, capability = capability.as_str(), "chained operation not found");
        }
        operation
    }
}

fn report(response: &mut CacheResponse, invoked: &[String]) -> anyhow::Result<()> {
    if invoked.is_empty() {
        return Ok(());
    }
    response.set_header(X_CACHE_CHAIN_OPERATIONS, &invoked.join("; "))
}

impl CachingOperation for Chain<'_> {
    fn intercept_response(
        &self,
        rule: &str,
        response: &mut CacheResponse,
    ) -> anyhow::Result<Option<Bytes>> {
        let mut invoked = Vec::new();
        for name in self.operation_names(rule) {
            let Some(operation) = self.resolve(Capability::Interceptor, &name) else {
                continue;
            };
            invoked.push(name);
            if let Some(body) = operation.intercept_response(rule, response)? {
                report(response, &invoked)?;
                return Ok(Some(body));
            }
        }
        Ok(None)
    }

    fn modify_response(&self, rule: &str, response: &mut CacheResponse) -> anyhow::Result<()> {
        let mut invoked = Vec::new();
        for name in self.operation_names(rule) {
            let Some(operation) = self.resolve(Capability::Mutator, &name) else {
                continue;
            };
            invoked.push(name);
            operation.modify_response(rule, response)?;
        }
        report(response, &invoked)
    }
}
