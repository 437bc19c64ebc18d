//! rulecache server: rule lookup, operation registry, dispatch engine and the
//! tower integration that runs it around HTTP services.

pub mod network;
pub mod service;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use network::{CachingLayer, Transform, TransformChain};
pub use service::{
    CacheDispatcher, Capability, Chain, DispatchConfig, DispatchError, Intercepted, Interception,
    OperationContext, OperationRegistry, RulesetRegistry,
};
pub use storage::MemorySettingsStore;
pub use telemetry::{init_tracing, TelemetryConfig};
