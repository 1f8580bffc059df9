use depthset_domain::errors::{RepositoryError, ValidationError};

/// Failure of one per-symbol cycle.
///
/// Storage failures are usually transient and may be retried. Validation failures, whether
/// found while decoding stored rows or while calculating, mean the stored data cannot be
/// processed as-is and retrying would fail the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    Validation(ValidationError),
    InvalidStoredData {
        context: String,
        error: ValidationError,
    },
    Storage(String),
}

impl CycleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CycleError::Storage(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Validation(_) | CycleError::InvalidStoredData { .. } => "validation",
            CycleError::Storage(_) => "storage",
        }
    }
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Validation(err) => write!(f, "invalid market data: {err}"),
            CycleError::InvalidStoredData { context, error } if context.is_empty() => {
                write!(f, "invalid stored data: {error}")
            }
            CycleError::InvalidStoredData { context, error } => {
                write!(f, "invalid stored data: {context}: {error}")
            }
            CycleError::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<ValidationError> for CycleError {
    fn from(err: ValidationError) -> Self {
        CycleError::Validation(err)
    }
}

impl From<RepositoryError> for CycleError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Storage(msg) => CycleError::Storage(msg),
            RepositoryError::InvalidData { context, error } => {
                CycleError::InvalidStoredData { context, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_retryable() {
        let storage = CycleError::from(RepositoryError::Storage("connection reset".to_string()));
        assert!(storage.is_retryable());
        assert_eq!(storage.kind(), "storage");

        let decoded = CycleError::from(RepositoryError::invalid(
            "order book at 1000 (asks): book row #0",
            ValidationError::MalformedLevel { fields: 1 },
        ));
        assert!(!decoded.is_retryable());
        assert_eq!(decoded.kind(), "validation");
        assert!(decoded
            .to_string()
            .starts_with("invalid stored data: order book at 1000 (asks): book row #0: "));

        let calculated = CycleError::from(ValidationError::ArithmeticOverflow("mul"));
        assert!(!calculated.is_retryable());
        assert_eq!(calculated.kind(), "validation");
    }
}
