use thiserror::Error;

/// Errors surfaced by the result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller passed something the store can never accept. Not retryable.
    #[error("{operation}: invalid argument: {message}")]
    InvalidArgument {
        operation: &'static str,
        message: String,
    },

    #[error("get_by_id: no result with id '{id}'")]
    NotFound { id: String },

    /// The backing database failed. The caller may retry.
    #[error("{operation}: storage failure: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn invalid(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation,
            message: message.into(),
        }
    }

    /// Adapter for `map_err`: wraps a database or pool error for `operation`.
    pub(crate) fn storage<E>(operation: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |source| Self::Storage {
            operation,
            source: Box::new(source),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_operation_and_parameter() {
        let err = StoreError::invalid("get_paged_items", "page_size must not be negative, got -2");
        assert_eq!(
            err.to_string(),
            "get_paged_items: invalid argument: page_size must not be negative, got -2"
        );
        assert!(!err.is_retryable());

        let err = StoreError::NotFound { id: "abc".into() };
        assert!(err.to_string().contains("'abc'"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = StoreError::storage("create")(rusqlite::Error::InvalidQuery);
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("create: storage failure"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
