//! Shared fixtures for unit and integration tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use http::StatusCode;
use rulecache_core::{
    CacheRequest, CacheResponse, CacheSettings, CachingOperation, ConflictError, OptionKey,
    Published, RulesetLookup, Settings,
};

use crate::service::registry::boxed;
use crate::service::OperationRegistry;

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Ruleset lookup returning a fixed answer for every resource.
pub(crate) enum FixedLookup {
    Rule(String),
    Nothing,
    Fail,
    Conflict,
}

impl FixedLookup {
    pub(crate) fn rule(rule: &str) -> Self {
        Self::Rule(rule.to_string())
    }

    pub(crate) fn none() -> Self {
        Self::Nothing
    }

    pub(crate) fn failing() -> Self {
        Self::Fail
    }

    pub(crate) fn conflicting() -> Self {
        Self::Conflict
    }
}

impl RulesetLookup for FixedLookup {
    fn lookup(&self, _: &Published, _: &CacheRequest) -> anyhow::Result<Option<String>> {
        match self {
            Self::Rule(rule) => Ok(Some(rule.clone())),
            Self::Nothing => Ok(None),
            Self::Fail => Err(anyhow!("lookup exploded")),
            Self::Conflict => {
                Err(anyhow::Error::new(ConflictError::new("lookup")).context("looking up rule"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Adds one header on modify; never intercepts.
pub(crate) struct HeaderOperation {
    header: String,
    value: String,
}

impl HeaderOperation {
    pub(crate) fn new(header: &str, value: &str) -> Self {
        Self {
            header: header.to_string(),
            value: value.to_string(),
        }
    }
}

impl CachingOperation for HeaderOperation {
    fn modify_response(&self, _rule: &str, response: &mut CacheResponse) -> anyhow::Result<()> {
        response.add_header(&self.header, &self.value)
    }
}

/// Claims the response with `body`, optionally setting a status first.
pub(crate) struct AbortOperation {
    pub(crate) status: Option<StatusCode>,
    pub(crate) header: Option<(String, String)>,
    pub(crate) body: Bytes,
}

impl AbortOperation {
    pub(crate) fn new(status: Option<StatusCode>, body: &'static str) -> Self {
        Self {
            status,
            header: None,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        self.header = Some((name.to_string(), value.to_string()));
        self
    }
}

impl CachingOperation for AbortOperation {
    fn intercept_response(
        &self,
        _rule: &str,
        response: &mut CacheResponse,
    ) -> anyhow::Result<Option<Bytes>> {
        if let Some(status) = self.status {
            response.set_status(status);
        }
        if let Some((name, value)) = &self.header {
            response.set_header(name, value)?;
        }
        Ok(Some(self.body.clone()))
    }
}

/// Fails on both capabilities, optionally with a conflict.
pub(crate) struct FailingOperation {
    pub(crate) conflict: bool,
}

impl FailingOperation {
    fn error(&self) -> anyhow::Error {
        if self.conflict {
            anyhow::Error::new(ConflictError::new("write skew")).context("operation failed")
        } else {
            anyhow!("operation failed")
        }
    }
}

impl CachingOperation for FailingOperation {
    fn intercept_response(
        &self,
        _rule: &str,
        _response: &mut CacheResponse,
    ) -> anyhow::Result<Option<Bytes>> {
        Err(self.error())
    }

    fn modify_response(&self, _rule: &str, _response: &mut CacheResponse) -> anyhow::Result<()> {
        Err(self.error())
    }
}

/// Counts invocations of either capability.
pub(crate) struct CountingOperation {
    pub(crate) calls: Arc<AtomicUsize>,
}

impl CachingOperation for CountingOperation {
    fn intercept_response(
        &self,
        _rule: &str,
        _response: &mut CacheResponse,
    ) -> anyhow::Result<Option<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn modify_response(&self, _rule: &str, _response: &mut CacheResponse) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(rule, op)| ((*rule).to_string(), (*op).to_string()))
        .collect()
}

/// Settings snapshot with the cache schema registered.
pub(crate) fn cache_settings(
    enabled: bool,
    mutators: &[(&str, &str)],
    interceptors: &[(&str, &str)],
) -> Settings {
    let mut settings = Settings::new();
    settings.register_schema(&CacheSettings {
        enabled,
        mutator_mapping: Some(mapping(mutators)),
        interceptor_mapping: Some(mapping(interceptors)),
    });
    settings
}

/// Adds a chain configuration, operation-wide or for one rule.
pub(crate) fn with_chain(mut settings: Settings, rule: Option<&str>, names: &[&str]) -> Settings {
    let prefix = crate::service::chain::Chain::PREFIX;
    let option = crate::service::chain::Chain::OPTION;
    let key = match rule {
        Some(rule) => OptionKey::rule(prefix, rule, option),
        None => OptionKey::operation(prefix, option),
    };
    let names: Vec<&str> = names.to_vec();
    settings.set(key, names);
    settings
}

/// Registry with the fixture operations:
///
/// - `op.header`: sets `x-cache-foo: foo`
/// - `op.header2`: sets `x-cache-bar: bar`
/// - `op.abort`: sets 304 and returns `"foo"`
/// - `op.abort.nostatus`: returns `"bar"` without touching the status
/// - `op.fail` / `op.conflict`: fail on both capabilities
pub(crate) fn fixture_registry() -> OperationRegistry {
    let registry = OperationRegistry::new();
    registry.register_operation("op.header", |_| boxed(HeaderOperation::new("x-cache-foo", "foo")));
    registry.register_operation("op.header2", |_| boxed(HeaderOperation::new("x-cache-bar", "bar")));
    registry.register_operation("op.abort", |_| {
        boxed(AbortOperation::new(Some(StatusCode::NOT_MODIFIED), "foo"))
    });
    registry.register_operation("op.abort.nostatus", |_| boxed(AbortOperation::new(None, "bar")));
    registry.register_operation("op.fail", |_| boxed(FailingOperation { conflict: false }));
    registry.register_operation("op.conflict", |_| boxed(FailingOperation { conflict: true }));
    crate::service::chain::Chain::register(&registry);
    registry
}
