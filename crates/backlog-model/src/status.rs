//! Workflow states of a work item

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a work item on the workflow board
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemStatus {
    /// Unrefined, unscheduled
    Backlog,
    /// Groomed and waiting to be picked up
    Ready,
    /// Being worked on
    InProgress,
    /// Waiting on something outside the team
    Blocked,
    /// Under code review
    InReview,
    /// Under test
    InTesting,
    /// Delivered
    Done,
    /// Dropped
    Cancelled,
}

impl WorkItemStatus {
    /// All states in board order
    pub const ALL: [Self; 8] = [
        Self::Backlog,
        Self::Ready,
        Self::InProgress,
        Self::Blocked,
        Self::InReview,
        Self::InTesting,
        Self::Done,
        Self::Cancelled,
    ];

    /// No transition leaves a terminal state
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// States from which an item may be blocked
    #[inline]
    #[must_use]
    pub const fn is_blockable(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::InProgress | Self::InReview | Self::InTesting
        )
    }

    /// Canonical upper-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::Blocked => "BLOCKED",
            Self::InReview => "IN_REVIEW",
            Self::InTesting => "IN_TESTING",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemStatus {
    type Err = ModelError;

    /// Accepts `IN_PROGRESS`, `in-progress` and `in_progress` alike
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| ModelError::Validation(format!("unknown status: {s}")))
    }
}
