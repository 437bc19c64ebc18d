//! Settings storage.
//!
//! [`MemorySettingsStore`] holds the process-wide [`Settings`] and hands out
//! immutable snapshots through [`SettingsSource`].
//!
//! [`Settings`]: rulecache_core::Settings
//! [`SettingsSource`]: rulecache_core::SettingsSource

pub mod settings_store;

pub use settings_store::*;
