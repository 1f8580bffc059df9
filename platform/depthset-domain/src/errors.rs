use crate::value_objects::order_book_event::OrderBookAction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MalformedDecimal {
        input: String,
        reason: String,
    },
    DivisionByZero,
    ArithmeticOverflow(&'static str),
    PrecisionLoss(&'static str),
    MalformedLevel {
        fields: usize,
    },
    MalformedBookSide(String),
    UnknownAction(String),
    UnexpectedAction {
        index: usize,
        expected: OrderBookAction,
        found: OrderBookAction,
    },
    OutOfOrderEvent {
        index: usize,
        previous_ms: i64,
        current_ms: i64,
    },
    BookAlreadyInitialized,
    BookNotInitialized,
    UnknownSymbol(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MalformedDecimal { input, reason } => {
                write!(f, "malformed decimal '{input}': {reason}")
            }
            ValidationError::DivisionByZero => write!(f, "division by zero"),
            ValidationError::ArithmeticOverflow(op) => write!(f, "decimal overflow in {op}"),
            ValidationError::PrecisionLoss(op) => {
                write!(f, "decimal {op} needs more than 28 fractional digits")
            }
            ValidationError::MalformedLevel { fields } => write!(
                f,
                "book level needs at least [price, quantity], got {fields} field(s)"
            ),
            ValidationError::MalformedBookSide(reason) => {
                write!(f, "malformed book side: {reason}")
            }
            ValidationError::UnknownAction(raw) => {
                write!(f, "unsupported order book action: {raw}")
            }
            ValidationError::UnexpectedAction {
                index,
                expected,
                found,
            } => write!(
                f,
                "order book event #{index} must be {expected}, found {found}"
            ),
            ValidationError::OutOfOrderEvent {
                index,
                previous_ms,
                current_ms,
            } => write!(
                f,
                "order book event #{index} goes back in time ({current_ms} < {previous_ms})"
            ),
            ValidationError::BookAlreadyInitialized => {
                write!(f, "order book already initialized; reset it first")
            }
            ValidationError::BookNotInitialized => {
                write!(f, "order book update before the initial snapshot")
            }
            ValidationError::UnknownSymbol(raw) => write!(f, "unknown symbol: {raw}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure reported by a repository port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The store failed or could not be reached. Usually transient.
    Storage(String),
    /// A stored row was read but holds values the domain rejects. Reading it again fails the
    /// same way.
    InvalidData {
        context: String,
        error: ValidationError,
    },
}

impl RepositoryError {
    pub fn invalid(context: impl Into<String>, error: ValidationError) -> Self {
        RepositoryError::InvalidData {
            context: context.into(),
            error,
        }
    }

    /// Prefixes the message with `outer`, e.g. the row or table being decoded.
    pub fn context(self, outer: impl std::fmt::Display) -> Self {
        match self {
            RepositoryError::Storage(msg) => RepositoryError::Storage(format!("{outer}: {msg}")),
            RepositoryError::InvalidData { context, error } if context.is_empty() => {
                RepositoryError::invalid(outer.to_string(), error)
            }
            RepositoryError::InvalidData { context, error } => {
                RepositoryError::invalid(format!("{outer}: {context}"), error)
            }
        }
    }
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::Storage(msg) => f.write_str(msg),
            RepositoryError::InvalidData { context, error } if context.is_empty() => {
                write!(f, "{error}")
            }
            RepositoryError::InvalidData { context, error } => write!(f, "{context}: {error}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<String> for RepositoryError {
    fn from(msg: String) -> Self {
        RepositoryError::Storage(msg)
    }
}

impl From<ValidationError> for RepositoryError {
    fn from(error: ValidationError) -> Self {
        RepositoryError::invalid(String::new(), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_context_nests_outermost_first() {
        let err = RepositoryError::from(ValidationError::MalformedLevel { fields: 1 })
            .context("book row #3")
            .context("order book at 1000 (asks)");
        assert_eq!(
            err,
            RepositoryError::invalid(
                "order book at 1000 (asks): book row #3",
                ValidationError::MalformedLevel { fields: 1 }
            )
        );
        assert_eq!(
            err.to_string(),
            "order book at 1000 (asks): book row #3: book level needs at least [price, quantity], got 1 field(s)"
        );

        let storage = RepositoryError::from("connection reset".to_string()).context("trades");
        assert_eq!(storage.to_string(), "trades: connection reset");
    }
}
