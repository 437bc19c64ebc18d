/// Raised by a transactional store when a concurrent write conflicts with the
/// current unit of work.
///
/// The dispatcher never swallows this error: it is handed back to the host so
/// the whole request can be retried. Operations and lookups signal it by
/// returning it (or any `anyhow::Error` wrapping it).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting concurrent write: {reason}")]
pub struct ConflictError {
    pub reason: String,
}

impl ConflictError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Finds a `ConflictError` anywhere in an error's cause chain.
    #[must_use]
    pub fn find(err: &anyhow::Error) -> Option<&ConflictError> {
        err.chain().find_map(|cause| cause.downcast_ref::<ConflictError>())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn find_sees_through_context() {
        let err: anyhow::Error = Err::<(), _>(ConflictError::new("catalog"))
            .context("indexing document")
            .unwrap_err();
        assert_eq!(ConflictError::find(&err), Some(&ConflictError::new("catalog")));
    }

    #[test]
    fn find_ignores_other_errors() {
        let err = anyhow::anyhow!("boom");
        assert!(ConflictError::find(&err).is_none());
    }
}
