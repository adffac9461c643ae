//! Error types for the MTA aggregator
//!
//! Rich error kinds are for internal diagnostics and logging. At the HAL
//! boundary every variant collapses to a binary ok/error (see [`crate::hal`]).

use thiserror::Error;

/// Result type alias for aggregator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the MTA aggregator
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown key, instance or index
    #[error("Not found: {0}")]
    NotFound(String),

    /// Index beyond the fixed cardinality of a collection
    #[error("Index {index} out of range (count {count})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Fixed collection size
        count: usize,
    },

    /// The line already has an unsealed call
    #[error("Line {0} is busy with an active call")]
    LineBusy(u32),

    /// A diagnostics run is already in progress on the line
    #[error("Diagnostics already running on line {0}")]
    AlreadyRunning(u32),

    /// The producer cannot currently supply a value
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// A write-once field is already populated
    #[error("Already set: {0}")]
    AlreadySet(String),

    /// A state machine refused a transition
    #[error("Invalid transition from {from}: {action}")]
    InvalidTransition {
        /// State the machine was in
        from: String,
        /// Requested action
        action: String,
    },

    /// Invalid input at the write boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from producers
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an "out of range" error
    pub fn out_of_range(index: usize, count: usize) -> Self {
        Self::OutOfRange { index, count }
    }

    /// Create an "unavailable" error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an "already set" error
    pub fn already_set(msg: impl Into<String>) -> Self {
        Self::AlreadySet(msg.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            action: action.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error reports a per-line concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::LineBusy(_) | Self::AlreadyRunning(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::out_of_range(9, 8);
        assert_eq!(err.to_string(), "Index 9 out of range (count 8)");

        let err = Error::invalid_transition("Error", "complete");
        assert_eq!(err.to_string(), "Invalid transition from Error: complete");
    }

    #[test]
    fn test_conflict_classification() {
        assert!(Error::LineBusy(1).is_conflict());
        assert!(Error::AlreadyRunning(2).is_conflict());
        assert!(!Error::already_set("MOS_LQ").is_conflict());
    }
}
