use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

/// Response headers set by the dispatcher.
pub mod headers {
    /// Name of the matched caching rule.
    pub const X_CACHE_RULE: &str = "x-cache-rule";
    /// Name of the mutator or interceptor that was resolved for the rule.
    pub const X_CACHE_OPERATION: &str = "x-cache-operation";
    /// Sub-operations invoked by a chain, joined with `"; "`.
    pub const X_CACHE_CHAIN_OPERATIONS: &str = "x-cache-chain-operations";
}

/// Mutable response state visible to caching operations.
///
/// Tracks whether a status was set explicitly, since an interceptor that
/// claims the response without choosing a status gets the configured abort
/// status instead. Once locked, the status can no longer change.
#[derive(Debug, Clone, Default)]
pub struct CacheResponse {
    status: Option<StatusCode>,
    status_locked: bool,
    headers: HeaderMap,
}

impl CacheResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the status and headers of a response produced by the resource.
    #[must_use]
    pub fn from_parts(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status: Some(status),
            status_locked: false,
            headers,
        }
    }

    /// Effective status: the explicit one, or `200 OK`.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Status set by the resource or an operation, if any.
    #[must_use]
    pub fn explicit_status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Sets the status. Returns `false` (and changes nothing) when locked.
    pub fn set_status(&mut self, status: StatusCode) -> bool {
        if self.status_locked {
            return false;
        }
        self.status = Some(status);
        true
    }

    /// Sets the status and prevents any later change.
    pub fn lock_status(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.status_locked = true;
    }

    #[must_use]
    pub fn is_status_locked(&self) -> bool {
        self.status_locked
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    /// Appends a header value, keeping existing values for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid HTTP header.
    pub fn add_header(&mut self, name: &str, value: &str) -> anyhow::Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Sets a header, replacing all existing values for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid HTTP header.
    pub fn set_header(&mut self, name: &str, value: &str) -> anyhow::Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Returns the first value of a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns every value of a header, in insertion order.
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Appends every header from `other`.
    pub fn extend_headers(&mut self, other: HeaderMap) {
        let mut current: Option<HeaderName> = None;
        for (name, value) in other {
            if let Some(name) = name {
                current = Some(name);
            }
            if let Some(name) = &current {
                self.headers.append(name.clone(), value);
            }
        }
    }
}

fn parse_header(name: &str, value: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| anyhow::anyhow!("invalid header name {name:?}: {e}"))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| anyhow::anyhow!("invalid value for header {name}: {e}"))?;
    Ok((name, value))
}
