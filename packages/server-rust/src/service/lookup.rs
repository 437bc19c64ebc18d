//! Ruleset declarations and the default published-resource -> rule lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rulecache_core::{is_dotted_name, CacheRequest, Published, RulesetLookup};
use tracing::debug;

/// A declared caching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruleset {
    pub name: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeclareError {
    #[error("invalid ruleset name: {0:?}")]
    InvalidName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("ruleset {0:?} has not been declared")]
    Undeclared(String),
    #[error("invalid ruleset name: {0:?}")]
    InvalidName(String),
}

/// Rule assignments keyed by resource kind, plus optional declarations.
///
/// In explicit mode a rule must be declared before it can be assigned.
#[derive(Default)]
pub struct RulesetRegistry {
    declared: RwLock<BTreeMap<String, Ruleset>>,
    assignments: DashMap<String, String>,
    explicit: RwLock<bool>,
}

impl RulesetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a rule so it can be listed and, in explicit mode, assigned.
    ///
    /// # Errors
    ///
    /// Returns [`DeclareError::InvalidName`] if `name` is not a dotted
    /// identifier.
    pub fn declare(
        &self,
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), DeclareError> {
        let name = name.into();
        if !is_dotted_name(&name) {
            return Err(DeclareError::InvalidName(name));
        }
        self.declared.write().insert(
            name.clone(),
            Ruleset {
                name,
                title: title.into(),
                description: description.into(),
            },
        );
        Ok(())
    }

    /// Assign `rule` to resources of `kind`, replacing any earlier assignment.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidName`] for a malformed name, and
    /// [`RegisterError::Undeclared`] in explicit mode when the rule was never
    /// declared.
    pub fn register(
        &self,
        kind: impl Into<String>,
        rule: impl Into<String>,
    ) -> Result<(), RegisterError> {
        let rule = rule.into();
        if !is_dotted_name(&rule) {
            return Err(RegisterError::InvalidName(rule));
        }
        if *self.explicit.read() && !self.declared.read().contains_key(&rule) {
            return Err(RegisterError::Undeclared(rule));
        }
        self.assignments.insert(kind.into(), rule);
        Ok(())
    }

    /// Require declaration before assignment.
    pub fn set_explicit(&self, explicit: bool) {
        *self.explicit.write() = explicit;
    }

    #[must_use]
    pub fn is_explicit(&self) -> bool {
        *self.explicit.read()
    }

    /// The rule assigned to `kind`.
    #[must_use]
    pub fn rule_for(&self, kind: &str) -> Option<String> {
        self.assignments.get(kind).map(|rule| rule.value().clone())
    }

    /// Declared rules in name order.
    #[must_use]
    pub fn rulesets(&self) -> Vec<Ruleset> {
        self.declared.read().values().cloned().collect()
    }
}

/// Looks rules up in a [`RulesetRegistry`] by the published resource's kind,
/// falling back to the owner's kind for published methods.
pub struct DefaultRulesetLookup {
    registry: Arc<RulesetRegistry>,
}

impl DefaultRulesetLookup {
    #[must_use]
    pub fn new(registry: Arc<RulesetRegistry>) -> Self {
        Self { registry }
    }
}

impl RulesetLookup for DefaultRulesetLookup {
    fn lookup(
        &self,
        published: &Published,
        _request: &CacheRequest,
    ) -> anyhow::Result<Option<String>> {
        let rule = self.registry.rule_for(&published.kind).or_else(|| {
            published
                .owner
                .as_deref()
                .and_then(|owner| self.registry.rule_for(owner))
        });
        debug!(resource = %published, rule = ?rule, "ruleset lookup");
        Ok(rule)
    }
}
