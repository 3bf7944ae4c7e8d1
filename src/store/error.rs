//! Story store error types
//!
//! Defines all errors that can occur in the store layer.

use thiserror::Error;

/// Errors that can occur in the story store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Persistence backend failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization of a persisted envelope failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persisted data carries a schema version this build cannot read
    #[error("Unsupported schema version {found} for key '{key}' (expected <= {supported})")]
    SchemaVersion {
        key: String,
        found: u32,
        supported: u32,
    },

    /// Requested story does not exist
    #[error("Story not found: {0}")]
    StoryNotFound(uuid::Uuid),

    /// Media sequence length outside 1..=10
    #[error("Invalid media count: {0} (must be 1..=10)")]
    InvalidMediaCount(usize),

    /// Caller is not allowed to perform the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::InvalidMediaCount(11);
        assert_eq!(err.to_string(), "Invalid media count: 11 (must be 1..=10)");

        let err = StoreError::Unauthorized("delete by non-author".to_string());
        assert_eq!(err.to_string(), "Unauthorized: delete by non-author");
    }

    #[test]
    fn test_serde_error_conversion() {
        let bad = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: StoreError = bad.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
