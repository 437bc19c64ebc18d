use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rulecache_core::{
    lookup_options, CacheRequest, CachingOperation, OperationType, Published, RulesetLookup,
    Settings, Value,
};
use tracing::debug;

use super::operation::{Capability, OperationContext, Resolution};

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Creates an operation instance bound to one request.
///
/// Returning `None` means the operation does not apply to this published
/// resource, which resolves like an unregistered name.
pub type OperationFactory = Arc<
    dyn for<'a> Fn(OperationContext<'a>) -> Option<Box<dyn CachingOperation + 'a>> + Send + Sync,
>;

/// Boxes an operation for return from a factory closure.
pub fn boxed<'a, O>(operation: O) -> Option<Box<dyn CachingOperation + 'a>>
where
    O: CachingOperation + 'a,
{
    Some(Box::new(operation))
}

struct Registration {
    capabilities: Vec<Capability>,
    factory: OperationFactory,
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Name-based registry of caching operation factories and type descriptors.
///
/// Populated at startup and read on every request. Factories are registered
/// for one or both capabilities; resolving a name for a capability it was not
/// registered with finds nothing.
pub struct OperationRegistry {
    /// Operation name -> factory and capabilities.
    factories: DashMap<String, Registration>,
    /// Operation name -> descriptor.
    types: DashMap<String, OperationType>,
    /// Registration order, for deterministic listing.
    order: RwLock<Vec<String>>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            types: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a factory under `name` for the given capabilities.
    /// Re-registering a name replaces the previous factory.
    pub fn register<F>(&self, name: impl Into<String>, capabilities: &[Capability], factory: F)
    where
        F: for<'a> Fn(OperationContext<'a>) -> Option<Box<dyn CachingOperation + 'a>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let previous = self.factories.insert(
            name.clone(),
            Registration {
                capabilities: capabilities.to_vec(),
                factory: Arc::new(factory),
            },
        );
        if previous.is_none() {
            self.order.write().push(name);
        }
    }

    /// Register a factory usable both as mutator and interceptor.
    pub fn register_operation<F>(&self, name: impl Into<String>, factory: F)
    where
        F: for<'a> Fn(OperationContext<'a>) -> Option<Box<dyn CachingOperation + 'a>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, &Capability::ALL, factory);
    }

    /// Register the descriptor of an operation type under its name.
    pub fn register_type(&self, operation_type: OperationType) {
        self.types.insert(operation_type.name.clone(), operation_type);
    }

    /// Retrieve an operation type descriptor by name.
    pub fn operation_type(&self, name: &str) -> Option<OperationType> {
        self.types.get(name).map(|entry| entry.value().clone())
    }

    /// All registered descriptors, sorted by name.
    pub fn operation_types(&self) -> Vec<OperationType> {
        let mut types: Vec<_> = self.types.iter().map(|e| e.value().clone()).collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    /// Registered operation names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Whether `name` is registered for `capability`.
    pub fn provides(&self, name: &str, capability: Capability) -> bool {
        self.factories
            .get(name)
            .is_some_and(|entry| entry.capabilities.contains(&capability))
    }

    /// Instantiate the operation registered under `name` for `capability`,
    /// bound to `ctx`.
    pub fn resolve<'a>(
        &self,
        capability: Capability,
        ctx: OperationContext<'a>,
        name: &str,
    ) -> Option<Box<dyn CachingOperation + 'a>> {
        // Release the map guard before running the factory, which may itself
        // resolve other operations.
        let factory = {
            let entry = self.factories.get(name)?;
            if !entry.capabilities.contains(&capability) {
                return None;
            }
            Arc::clone(&entry.factory)
        };
        factory(ctx)
    }

    /// Find the mutator for the published resource.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the ruleset lookup.
    pub fn resolve_mutator<'a>(
        &'a self,
        settings: Option<&'a Settings>,
        lookup: &dyn RulesetLookup,
        published: &'a Published,
        request: &'a CacheRequest,
    ) -> anyhow::Result<Resolution<'a>> {
        self.resolve_for(Capability::Mutator, settings, lookup, published, request)
    }

    /// Find the interceptor for the published resource.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the ruleset lookup.
    pub fn resolve_interceptor<'a>(
        &'a self,
        settings: Option<&'a Settings>,
        lookup: &dyn RulesetLookup,
        published: &'a Published,
        request: &'a CacheRequest,
    ) -> anyhow::Result<Resolution<'a>> {
        self.resolve_for(Capability::Interceptor, settings, lookup, published, request)
    }

    fn resolve_for<'a>(
        &'a self,
        capability: Capability,
        settings: Option<&'a Settings>,
        lookup: &dyn RulesetLookup,
        published: &'a Published,
        request: &'a CacheRequest,
    ) -> anyhow::Result<Resolution<'a>> {
        let Some(cache) = settings.and_then(Settings::for_schema) else {
            return Ok(Resolution::default());
        };
        if !cache.enabled {
            return Ok(Resolution::default());
        }

        let Some(rule) = lookup.lookup(published, request)? else {
            return Ok(Resolution::default());
        };

        let mapped = match capability {
            Capability::Mutator => cache.mutator_for(&rule),
            Capability::Interceptor => cache.interceptor_for(&rule),
        };
        let Some(operation) = mapped.map(str::to_string) else {
            debug!(rule = %rule, capability = capability.as_str(), "no operation mapped");
            return Ok(Resolution {
                rule: Some(rule),
                ..Resolution::default()
            });
        };

        let ctx = OperationContext {
            published,
            request,
            settings,
            registry: self,
            depth: 0,
        };
        let instance = self.resolve(capability, ctx, &operation);
        if instance.is_none() {
            debug!(
                rule = %rule,
                operation = %operation,
                capability = capability.as_str(),
                "mapped operation not found"
            );
        }

        Ok(Resolution {
            rule: Some(rule),
            operation: Some(operation),
            instance,
        })
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves every option of the operation type registered under `name`.
///
/// An unknown name yields an empty map.
#[must_use]
pub fn lookup_named_options(
    settings: Option<&Settings>,
    registry: &OperationRegistry,
    name: &str,
    rule: Option<&str>,
    default: &Value,
) -> BTreeMap<String, Value> {
    registry
        .operation_type(name)
        .map(|operation| lookup_options(settings, &operation, rule, default))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
