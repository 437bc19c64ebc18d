//! Immutable settings snapshots and the source trait the dispatcher reads them from.
//!
//! Records are keyed by a structured [`OptionKey`] rather than a dotted
//! string, so a rule or option name containing a dot can never collide with a
//! different `(prefix, rule, option)` triple.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::CacheSettings;
use crate::types::Value;

/// Structured settings key: `prefix`, optional per-rule segment, option name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionKey {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub option: String,
}

impl OptionKey {
    /// Operation-wide default: `prefix.option`.
    #[must_use]
    pub fn operation(prefix: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            rule: None,
            option: option.into(),
        }
    }

    /// Per-rule override: `prefix.rule.option`.
    #[must_use]
    pub fn rule(
        prefix: impl Into<String>,
        rule: impl Into<String>,
        option: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            rule: Some(rule.into()),
            option: option.into(),
        }
    }
}

/// Dotted rendering, for logs and diagnostics only.
impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{}.{}.{}", self.prefix, rule, self.option),
            None => write!(f, "{}.{}", self.prefix, self.option),
        }
    }
}

/// Point-in-time view of the settings store.
///
/// Fetched once at the start of each dispatch entry point and dropped at the
/// end, so one request never observes two different configurations.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    records: HashMap<OptionKey, Value>,
}

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record stored under `key`, if registered.
    #[must_use]
    pub fn get(&self, key: &OptionKey) -> Option<&Value> {
        self.records.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &OptionKey) -> bool {
        self.records.contains_key(key)
    }

    /// Registers or replaces a record.
    pub fn set(&mut self, key: OptionKey, value: impl Into<Value>) {
        self.records.insert(key, value.into());
    }

    /// Builder-style [`Settings::set`].
    #[must_use]
    pub fn with(mut self, key: OptionKey, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &OptionKey) -> Option<Value> {
        self.records.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reads the cache settings schema from the records under
    /// [`CacheSettings::PREFIX`]. `None` when the schema was never registered.
    #[must_use]
    pub fn for_schema(&self) -> Option<CacheSettings> {
        CacheSettings::from_settings(self)
    }

    /// Writes the cache settings schema records, replacing previous values.
    pub fn register_schema(&mut self, cache: &CacheSettings) {
        cache.write_to(self);
    }
}

/// Source of settings snapshots (the external, process-wide settings store).
///
/// `None` means no store is configured or it cannot be reached; callers treat
/// that exactly like disabled caching.
pub trait SettingsSource: Send + Sync {
    fn snapshot(&self) -> Option<Arc<Settings>>;
}

/// A fixed snapshot is its own source. Handy for tests and static setups.
impl SettingsSource for Arc<Settings> {
    fn snapshot(&self) -> Option<Arc<Settings>> {
        Some(Arc::clone(self))
    }
}

/// No store configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettings;

impl SettingsSource for NoSettings {
    fn snapshot(&self) -> Option<Arc<Settings>> {
        None
    }
}
