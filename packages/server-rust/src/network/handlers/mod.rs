//! Response handlers used by the caching layer.

pub mod abort;

pub use abort::conflict_response;
