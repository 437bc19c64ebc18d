use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::settings::{OptionKey, Settings};
use crate::types::Value;

static DOTTED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*(\.[A-Za-z_][A-Za-z0-9_\-]*)*$")
        .expect("dotted name pattern is valid")
});

/// Whether `name` follows the dotted identifier convention used for rule and
/// operation names (`plone.content.itemView`, `my.op`).
#[must_use]
pub fn is_dotted_name(name: &str) -> bool {
    DOTTED_NAME.is_match(name)
}

/// Global cache settings, stored as records under [`CacheSettings::PREFIX`].
///
/// `enabled` defaults to `false`: with no settings registered, nothing runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// If not set, no caching operations will be attempted.
    pub enabled: bool,
    /// Maps rule names to mutator operation names.
    pub mutator_mapping: Option<BTreeMap<String, String>>,
    /// Maps rule names to interceptor operation names.
    pub interceptor_mapping: Option<BTreeMap<String, String>>,
}

impl CacheSettings {
    pub const PREFIX: &'static str = "rulecache.settings";
    pub const ENABLED: &'static str = "enabled";
    pub const MUTATOR_MAPPING: &'static str = "mutator_mapping";
    pub const INTERCEPTOR_MAPPING: &'static str = "interceptor_mapping";

    /// Reads the schema from `settings`. Returns `None` when the `enabled`
    /// record is missing (schema not registered).
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let enabled = settings.get(&OptionKey::operation(Self::PREFIX, Self::ENABLED))?;
        Some(Self {
            enabled: enabled.as_bool().unwrap_or(false),
            mutator_mapping: read_mapping(settings, Self::MUTATOR_MAPPING),
            interceptor_mapping: read_mapping(settings, Self::INTERCEPTOR_MAPPING),
        })
    }

    pub(crate) fn write_to(&self, settings: &mut Settings) {
        settings.set(OptionKey::operation(Self::PREFIX, Self::ENABLED), self.enabled);
        settings.set(
            OptionKey::operation(Self::PREFIX, Self::MUTATOR_MAPPING),
            self.mutator_mapping.clone().map_or(Value::Null, Value::from),
        );
        settings.set(
            OptionKey::operation(Self::PREFIX, Self::INTERCEPTOR_MAPPING),
            self.interceptor_mapping.clone().map_or(Value::Null, Value::from),
        );
    }

    /// Operation mapped to `rule` for mutation.
    #[must_use]
    pub fn mutator_for(&self, rule: &str) -> Option<&str> {
        self.mutator_mapping.as_ref()?.get(rule).map(String::as_str)
    }

    /// Operation mapped to `rule` for interception.
    #[must_use]
    pub fn interceptor_for(&self, rule: &str) -> Option<&str> {
        self.interceptor_mapping.as_ref()?.get(rule).map(String::as_str)
    }

    /// Returns the mapping entries whose rule or operation name is not a
    /// dotted identifier.
    #[must_use]
    pub fn invalid_entries(&self) -> Vec<(String, String)> {
        self.mutator_mapping
            .iter()
            .chain(self.interceptor_mapping.iter())
            .flatten()
            .filter(|(rule, op)| !is_dotted_name(rule) || !is_dotted_name(op))
            .map(|(rule, op)| (rule.clone(), op.clone()))
            .collect()
    }
}

fn read_mapping(settings: &Settings, option: &str) -> Option<BTreeMap<String, String>> {
    let map = settings
        .get(&OptionKey::operation(CacheSettings::PREFIX, option))?
        .as_map()?;
    Some(
        map.iter()
            .filter_map(|(rule, op)| op.as_str().map(|op| (rule.clone(), op.to_string())))
            .collect(),
    )
}

/// Descriptor of a caching operation type, for discovery and option lookup.
///
/// The name matches the name the operation factory is registered under. By
/// convention the option `prefix` is the same as the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationType {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Prefix for this operation's records in the settings store.
    pub prefix: String,
    /// Option names, looked up as `prefix.option` or `prefix.rule.option`.
    #[serde(default)]
    pub options: Vec<String>,
}

impl OperationType {
    #[must_use]
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prefix: name.clone(),
            name,
            title: title.into(),
            description: String::new(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}
