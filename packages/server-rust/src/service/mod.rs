//! Rule-driven caching operation pipeline.
//!
//! 1. **Lookup** (`lookup`): published resource -> rule name
//! 2. **Registry** (`registry`): rule -> mapped operation name -> instance
//! 3. **Chain** (`chain`): composite operation over a configured name list
//! 4. **Dispatch** (`dispatch`): intercept / mutate entry points with fault
//!    isolation

pub mod chain;
pub mod config;
pub mod dispatch;
pub mod lookup;
pub mod operation;
pub mod registry;

// Re-export key types for convenient access.
pub use chain::Chain;
pub use config::DispatchConfig;
pub use dispatch::{CacheDispatcher, DispatchState};
pub use lookup::{DeclareError, DefaultRulesetLookup, RegisterError, Ruleset, RulesetRegistry};
pub use operation::{
    Capability, DispatchError, Intercepted, Interception, OperationContext, Resolution,
};
pub use registry::{boxed, lookup_named_options, OperationFactory, OperationRegistry};
