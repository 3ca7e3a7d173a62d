use derive_more::Display;
use thiserror::Error;

#[derive(Debug, Error, Display, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[display("Cache error: {}", _0)]
    CacheError(String),

    #[display("Connection error: {}", _0)]
    ConnectionError(String),

    /// The key holds a value of a different kind than the operation expects.
    #[display("Wrong type for key: {}", _0)]
    WrongType(String),

    #[display("Invalid value: {}", _0)]
    InvalidValue(String),

    #[display("Timeout error")]
    TimeoutError,

    #[display("Operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// True for failures raised by the caller's context rather than the store.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CoreError::TimeoutError | CoreError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CoreError::CacheError("boom".to_string()).to_string(),
            "Cache error: boom"
        );
        assert_eq!(CoreError::Cancelled.to_string(), "Operation cancelled");
        assert_eq!(CoreError::TimeoutError.to_string(), "Timeout error");
    }

    #[test]
    fn test_interrupted_classification() {
        assert!(CoreError::Cancelled.is_interrupted());
        assert!(CoreError::TimeoutError.is_interrupted());
        assert!(!CoreError::WrongType("k".to_string()).is_interrupted());
    }
}
