//! `rulecache` core: data model for rule-driven HTTP response caching.
//!
//! Holds everything the dispatcher and caching operations share: settings
//! snapshots and option resolution, the request/response views, schema
//! descriptors and the operation traits.

pub mod context;
pub mod error;
pub mod options;
pub mod response;
pub mod schema;
pub mod settings;
pub mod traits;
pub mod types;

pub use context::{CacheRequest, Environ, TRANSFORM_CHAIN_DISABLE};
pub use error::ConflictError;
pub use options::{lookup_option, lookup_options};
pub use response::{headers, CacheResponse};
pub use schema::{is_dotted_name, CacheSettings, OperationType};
pub use settings::{NoSettings, OptionKey, Settings, SettingsSource};
pub use traits::{CachingOperation, RulesetLookup};
pub use types::{Published, Value};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
