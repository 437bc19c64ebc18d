//! In-memory settings store with atomically swapped snapshots.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use rulecache_core::{CacheSettings, OptionKey, Settings, SettingsSource, Value};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("malformed settings document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("mapping entries with invalid names: {0:?}")]
    InvalidMapping(Vec<(String, String)>),
}

/// One option record in a settings document.
#[derive(Debug, Deserialize)]
struct OptionRecord {
    #[serde(flatten)]
    key: OptionKey,
    value: Value,
}

/// JSON settings document:
///
/// ```json
/// {
///   "cache": { "enabled": true, "mutator_mapping": { "rule": "operation" } },
///   "options": [ { "prefix": "my.op", "rule": "rule", "option": "ttl", "value": 60 } ]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    cache: Option<CacheSettings>,
    #[serde(default)]
    options: Vec<OptionRecord>,
}

/// Process-wide settings store.
///
/// Readers take a snapshot with [`SettingsSource::snapshot`]; writers build a
/// new [`Settings`] and swap it in. A snapshot already handed out never
/// changes.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    current: ArcSwapOption<Settings>,
}

impl MemorySettingsStore {
    /// Creates a store with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        let store = Self::new();
        store.replace(settings);
        store
    }

    /// Parses a JSON settings document.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Json`] for malformed input and
    /// [`SettingsError::InvalidMapping`] when a mapping names a rule or
    /// operation that is not a dotted identifier.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let document: SettingsDocument = serde_json::from_str(json)?;

        let mut settings = Settings::new();
        if let Some(cache) = document.cache {
            let invalid = cache.invalid_entries();
            if !invalid.is_empty() {
                return Err(SettingsError::InvalidMapping(invalid));
            }
            settings.register_schema(&cache);
        }
        for record in document.options {
            settings.set(record.key, record.value);
        }

        info!(records = settings.len(), "loaded cache settings");
        Ok(Self::with_settings(settings))
    }

    /// Swaps in a new snapshot.
    pub fn replace(&self, settings: Settings) {
        self.current.store(Some(Arc::new(settings)));
    }

    /// Applies `edit` to a copy of the current settings and swaps the result
    /// in. Starts from empty settings if none were configured. `edit` may run
    /// more than once under concurrent updates.
    pub fn update<F>(&self, mut edit: F)
    where
        F: FnMut(&mut Settings),
    {
        self.current.rcu(|current| {
            let mut next = current.as_deref().cloned().unwrap_or_default();
            edit(&mut next);
            Some(Arc::new(next))
        });
    }

    /// Sets one option record.
    pub fn set_option(&self, key: OptionKey, value: impl Into<Value>) {
        let value = value.into();
        self.update(|settings| settings.set(key.clone(), value.clone()));
    }

    /// Removes every snapshot; lookups then see no store at all.
    pub fn clear(&self) {
        self.current.store(None);
    }
}

impl SettingsSource for MemorySettingsStore {
    fn snapshot(&self) -> Option<Arc<Settings>> {
        self.current.load_full()
    }
}
