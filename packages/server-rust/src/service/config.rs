use http::StatusCode;

/// Dispatcher and host-integration configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Status sent when an interceptor claims the response without setting
    /// one itself.
    pub abort_status: StatusCode,
    /// Largest response body the transform chain will buffer. Larger bodies
    /// are passed through untransformed.
    pub max_body_bytes: usize,
    /// `Retry-After` seconds sent when a storage conflict aborts the request.
    pub conflict_retry_after_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            abort_status: StatusCode::NOT_MODIFIED,
            max_body_bytes: 8 * 1024 * 1024,
            conflict_retry_after_secs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.abort_status, StatusCode::NOT_MODIFIED);
        assert_eq!(config.max_body_bytes, 8_388_608);
        assert_eq!(config.conflict_retry_after_secs, 1);
    }
}
