//! HTTP host integration.
//!
//! - [`CachingLayer`]: tower layer running the intercept and mutate hooks
//!   around any axum/tower service
//! - [`handlers`]: abort and conflict responses
//! - [`TransformChain`]: ordered response body transforms

pub mod handlers;
pub mod middleware;
pub mod transform;

pub use handlers::conflict_response;
pub use middleware::{CachingLayer, CachingService};
pub use transform::{Transform, TransformChain};
