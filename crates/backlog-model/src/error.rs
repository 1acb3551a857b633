//! Error types for the backlog data model

/// Errors raised while constructing or validating model values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Effort value is not a member of the effort scale
    #[error("effort {0} is not on the scale 1, 2, 3, 5, 8, 13, 21, 40, 100")]
    InvalidEffort(i64),

    /// A required field is missing or malformed
    #[error("validation failed: {0}")]
    Validation(String),
}

/// A broken consistency rule on a stored work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// `completed_at` set without DONE, or DONE without `completed_at`
    #[error("completion timestamp must be present exactly when the item is DONE")]
    CompletionMismatch,

    /// Blockage fields disagree with the BLOCKED status
    #[error("blockage reason must be present exactly when the item is BLOCKED")]
    BlockageMismatch,

    /// Item scheduled into an iteration while still in BACKLOG
    #[error("an item in BACKLOG cannot be scheduled into an iteration")]
    ScheduledBacklogItem,
}
