//! Work items
//!
//! A [`WorkItem`] is the unit of plannable work. New items are described by
//! a [`NewWorkItem`] field bundle and stored with a [`WorkItemId`] assigned by
//! the store.

use crate::effort::Effort;
use crate::error::{InvariantViolation, ModelError};
use crate::priority::Priority;
use crate::status::WorkItemStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique, monotonically increasing work item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub u64);

impl WorkItemId {
    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for WorkItemId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ModelError::Validation(format!("invalid work item id: {s}")))
    }
}

/// Fields supplied by a caller creating a work item
///
/// Effort is kept raw here; the store decides whether to reject or snap an
/// off-scale value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkItem {
    /// Short title, required
    pub title: String,
    /// "As a ..."
    #[serde(default)]
    pub requester_role: String,
    /// "I want ..."
    #[serde(default)]
    pub desired_capability: String,
    /// "So that ..."
    #[serde(default)]
    pub business_justification: String,
    /// Raw effort estimate
    pub effort: i64,
    /// Business priority
    #[serde(default)]
    pub priority: Priority,
    /// Definition of done
    #[serde(default)]
    pub acceptance_criteria: String,
    /// Optional owner
    #[serde(default)]
    pub assignee: Option<String>,
}

impl NewWorkItem {
    /// Start a new item description
    #[must_use]
    pub fn new(title: impl Into<String>, effort: i64, priority: Priority) -> Self {
        Self {
            title: title.into(),
            requester_role: String::new(),
            desired_capability: String::new(),
            business_justification: String::new(),
            effort,
            priority,
            acceptance_criteria: String::new(),
            assignee: None,
        }
    }

    /// Set the "as a / I want / so that" narrative
    #[must_use]
    pub fn with_story(
        mut self,
        requester_role: impl Into<String>,
        desired_capability: impl Into<String>,
        business_justification: impl Into<String>,
    ) -> Self {
        self.requester_role = requester_role.into();
        self.desired_capability = desired_capability.into();
        self.business_justification = business_justification.into();
        self
    }

    /// Set the acceptance criteria
    #[must_use]
    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = criteria.into();
        self
    }

    /// Set the assignee
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Check the required text fields
    ///
    /// # Errors
    /// Returns [`ModelError::Validation`] for a blank title
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.title.trim().is_empty() {
            return Err(ModelError::Validation("title must not be empty".into()));
        }
        Ok(())
    }
}

/// A unit of backlog work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Identifier assigned at creation
    pub id: WorkItemId,
    /// Short title
    pub title: String,
    /// "As a ..."
    pub requester_role: String,
    /// "I want ..."
    pub desired_capability: String,
    /// "So that ..."
    pub business_justification: String,
    /// Effort on the fixed scale
    pub effort: Effort,
    /// Business priority
    pub priority: Priority,
    /// Iteration the item is committed to; `None` while unscheduled
    pub iteration: Option<u32>,
    /// Workflow state
    pub status: WorkItemStatus,
    /// Definition of done
    pub acceptance_criteria: String,
    /// Refined in a grooming session
    pub groomed: bool,
    /// Mirrors `status == Blocked`
    pub blocked: bool,
    /// Why the item is blocked
    pub blockage_reason: Option<String>,
    /// State the item returns to when unblocked
    #[serde(default)]
    pub blocked_from: Option<WorkItemStatus>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Time the item reached DONE
    pub completed_at: Option<DateTime<Utc>>,
    /// Current owner
    pub assignee: Option<String>,
}

impl WorkItem {
    /// Build a freshly created item in BACKLOG
    #[must_use]
    pub fn new(id: WorkItemId, fields: NewWorkItem, effort: Effort, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: fields.title.trim().to_string(),
            requester_role: fields.requester_role,
            desired_capability: fields.desired_capability,
            business_justification: fields.business_justification,
            effort,
            priority: fields.priority,
            iteration: None,
            status: WorkItemStatus::Backlog,
            acceptance_criteria: fields.acceptance_criteria,
            groomed: false,
            blocked: false,
            blockage_reason: None,
            blocked_from: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            assignee: fields.assignee,
        }
    }

    /// Still in BACKLOG or READY with no iteration assigned
    #[inline]
    #[must_use]
    pub fn is_plannable(&self) -> bool {
        self.iteration.is_none()
            && matches!(self.status, WorkItemStatus::Backlog | WorkItemStatus::Ready)
    }

    /// Verify the consistency rules between status and the dependent fields
    ///
    /// # Errors
    /// Returns the first [`InvariantViolation`] found
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let done = self.status == WorkItemStatus::Done;
        if self.completed_at.is_some() != done {
            return Err(InvariantViolation::CompletionMismatch);
        }

        let blocked = self.status == WorkItemStatus::Blocked;
        if self.blockage_reason.is_some() != blocked
            || self.blocked != blocked
            || self.blocked_from.is_some() != blocked
        {
            return Err(InvariantViolation::BlockageMismatch);
        }

        if self.status == WorkItemStatus::Backlog && self.iteration.is_some() {
            return Err(InvariantViolation::ScheduledBacklogItem);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkItem {
        let fields = NewWorkItem::new("  Validate cover sheets ", 5, Priority::High)
            .with_story("compliance officer", "validate reports", "stay compliant")
            .with_acceptance_criteria("every report has a cover sheet");
        WorkItem::new(WorkItemId(1), fields, Effort::new(5).unwrap(), Utc::now())
    }

    #[test]
    fn new_item_starts_in_backlog() {
        let item = sample();
        assert_eq!(item.status, WorkItemStatus::Backlog);
        assert_eq!(item.iteration, None);
        assert!(!item.groomed);
        assert!(!item.blocked);
        assert_eq!(item.created_at, item.updated_at);
        assert_eq!(item.title, "Validate cover sheets");
        assert!(item.is_plannable());
        assert!(item.check_invariants().is_ok());
    }

    #[test]
    fn blank_title_fails_validation() {
        let fields = NewWorkItem::new("   ", 3, Priority::Low);
        assert!(matches!(fields.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn invariants_catch_completion_mismatch() {
        let mut item = sample();
        item.completed_at = Some(Utc::now());
        assert_eq!(
            item.check_invariants(),
            Err(InvariantViolation::CompletionMismatch)
        );
    }

    #[test]
    fn invariants_catch_blockage_mismatch() {
        let mut item = sample();
        item.status = WorkItemStatus::Blocked;
        assert_eq!(
            item.check_invariants(),
            Err(InvariantViolation::BlockageMismatch)
        );
    }

    #[test]
    fn invariants_catch_scheduled_backlog_item() {
        let mut item = sample();
        item.iteration = Some(2);
        assert_eq!(
            item.check_invariants(),
            Err(InvariantViolation::ScheduledBacklogItem)
        );
    }

    #[test]
    fn id_parses_with_or_without_hash() {
        assert_eq!("#12".parse::<WorkItemId>().unwrap(), WorkItemId(12));
        assert_eq!("7".parse::<WorkItemId>().unwrap(), WorkItemId(7));
        assert!("seven".parse::<WorkItemId>().is_err());
    }

    #[test]
    fn item_json_round_trip() {
        let item = sample();
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"status\":\"BACKLOG\""));
        assert!(json.contains("\"priority\":\"HIGH\""));
        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
