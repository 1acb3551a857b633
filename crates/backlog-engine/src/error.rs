//! Error types for the backlog engine
//!
//! Every operation returns [`BacklogError`] synchronously. Nothing is retried:
//! all operations are deterministic in-memory computations, so an error is
//! local to the single request that caused it.

use backlog_model::{ModelError, WorkItemId, WorkItemStatus};

/// Result alias used throughout the engine
pub type BacklogResult<T> = Result<T, BacklogError>;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum BacklogError {
    /// Unknown work item id
    #[error("work item {0} not found")]
    NotFound(WorkItemId),

    /// Effort not on the scale (strict policy)
    #[error("effort {0} is not on the scale 1, 2, 3, 5, 8, 13, 21, 40, 100")]
    InvalidEffort(i64),

    /// Requested status change is not an edge of the workflow graph
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        /// Current status
        from: WorkItemStatus,
        /// Requested status
        to: WorkItemStatus,
    },

    /// Missing or malformed input
    #[error("validation failed: {0}")]
    Validation(String),

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot could not be encoded, decoded or restored
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Audit journal failure
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// Filesystem failure while loading or saving state
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BacklogError {
    /// Request-level errors a transport would report back to its caller
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidEffort(_)
                | Self::IllegalTransition { .. }
                | Self::Validation(_)
        )
    }

    /// Errors caused by the engine's environment rather than the request
    #[inline]
    #[must_use]
    pub fn is_system_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl From<ModelError> for BacklogError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::InvalidEffort(raw) => Self::InvalidEffort(raw),
            ModelError::Validation(msg) => Self::Validation(msg),
        }
    }
}

impl From<serde_json::Error> for BacklogError {
    fn from(value: serde_json::Error) -> Self {
        Self::Snapshot(value.to_string())
    }
}

impl From<toml::de::Error> for BacklogError {
    fn from(value: toml::de::Error) -> Self {
        Self::Config(value.to_string())
    }
}

/// Audit journal errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// Hash chain no longer matches the recorded events
    #[error("hash chain broken at event {index}")]
    IntegrityViolation {
        /// Position of the first bad event
        index: usize,
    },
}
