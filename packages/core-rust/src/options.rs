//! Option resolution with per-rule overrides.
//!
//! An operation reads its configuration from the settings store as follows:
//!
//! 1. `prefix.rule.option` if present (per-rule override)
//! 2. otherwise `prefix.option` if present (operation default)
//! 3. otherwise the caller's default
//!
//! A missing store resolves every option to the default.

use std::collections::BTreeMap;

use tracing::trace;

use crate::schema::OperationType;
use crate::settings::{OptionKey, Settings};
use crate::types::Value;

/// Resolves a single option.
#[must_use]
pub fn lookup_option(
    settings: Option<&Settings>,
    prefix: &str,
    rule: Option<&str>,
    option: &str,
    default: Value,
) -> Value {
    let Some(settings) = settings else {
        return default;
    };

    if let Some(rule) = rule {
        if let Some(value) = settings.get(&OptionKey::rule(prefix, rule, option)) {
            trace!(prefix, rule, option, "option resolved from rule override");
            return value.clone();
        }
    }

    match settings.get(&OptionKey::operation(prefix, option)) {
        Some(value) => value.clone(),
        None => {
            trace!(prefix, option, "option unset, using default");
            default
        }
    }
}

/// Resolves every option declared on `operation` against one snapshot.
#[must_use]
pub fn lookup_options(
    settings: Option<&Settings>,
    operation: &OperationType,
    rule: Option<&str>,
    default: &Value,
) -> BTreeMap<String, Value> {
    operation
        .options
        .iter()
        .map(|option| {
            let value = lookup_option(settings, &operation.prefix, rule, option, default.clone());
            (option.clone(), value)
        })
        .collect()
}
