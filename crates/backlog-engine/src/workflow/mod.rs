//! Workflow state machine
//!
//! ```text
//! BACKLOG -> READY -> IN_PROGRESS -> IN_REVIEW -> IN_TESTING -> DONE
//! READY | IN_PROGRESS | IN_REVIEW | IN_TESTING -> BLOCKED -> (state it left)
//! any non-terminal -> CANCELLED
//! ```
//!
//! DONE and CANCELLED are terminal. A request to move an item to the state
//! it is already in is rejected like any other missing edge.

use crate::error::{BacklogError, BacklogResult};
use crate::store::WorkItemStore;
use backlog_model::{WorkItem, WorkItemId, WorkItemStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Statically known successors of `from`
///
/// BLOCKED lists only CANCELLED here: its return edge depends on the state
/// the individual item was blocked from, see [`validate_item_transition`].
#[must_use]
pub fn allowed_transitions(from: WorkItemStatus) -> Vec<WorkItemStatus> {
    use WorkItemStatus::*;
    match from {
        Backlog => vec![Ready, Cancelled],
        Ready => vec![InProgress, Blocked, Cancelled],
        InProgress => vec![InReview, Blocked, Cancelled],
        InReview => vec![InTesting, Blocked, Cancelled],
        InTesting => vec![Done, Blocked, Cancelled],
        Blocked => vec![Cancelled],
        Done | Cancelled => vec![],
    }
}

/// Validate a status change against the static graph
///
/// # Errors
/// Returns [`BacklogError::IllegalTransition`] when `to` is not a successor
pub fn validate_transition(from: WorkItemStatus, to: WorkItemStatus) -> BacklogResult<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(BacklogError::IllegalTransition { from, to })
    }
}

/// Validate a status change for a concrete item, including the BLOCKED
/// return edge
///
/// # Errors
/// Returns [`BacklogError::IllegalTransition`] when `to` is not reachable
pub fn validate_item_transition(item: &WorkItem, to: WorkItemStatus) -> BacklogResult<()> {
    let from = item.status;
    if from == WorkItemStatus::Blocked && item.blocked_from == Some(to) {
        return Ok(());
    }
    validate_transition(from, to)
}

/// Applies validated status changes to items in a shared store
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    store: Arc<WorkItemStore>,
}

impl WorkflowEngine {
    /// Create an engine over `store`
    #[must_use]
    pub fn new(store: Arc<WorkItemStore>) -> Self {
        Self { store }
    }

    /// Move an item to `to`
    ///
    /// Entering DONE stamps `completed_at`; leaving BLOCKED clears the
    /// blockage fields. Moving to BLOCKED needs a reason, so it goes through
    /// [`WorkflowEngine::block`] instead.
    ///
    /// # Errors
    /// - [`BacklogError::NotFound`] for an unknown id
    /// - [`BacklogError::Validation`] when `to` is BLOCKED
    /// - [`BacklogError::IllegalTransition`] when `to` is not reachable
    pub fn transition(&self, id: WorkItemId, to: WorkItemStatus) -> BacklogResult<WorkItem> {
        self.transition_observed(id, to, |_| {})
    }

    /// As [`WorkflowEngine::transition`], calling `observe` with the changed
    /// item while the store is still locked
    ///
    /// # Errors
    /// See [`WorkflowEngine::transition`]
    pub fn transition_observed<F>(
        &self,
        id: WorkItemId,
        to: WorkItemStatus,
        observe: F,
    ) -> BacklogResult<WorkItem>
    where
        F: FnOnce(&WorkItem),
    {
        if to == WorkItemStatus::Blocked {
            return Err(BacklogError::Validation(
                "blocking requires a reason; use block".into(),
            ));
        }

        let result = self.store.try_update(id, |item| {
            validate_item_transition(item, to)?;
            let from = item.status;
            apply_status(item, to);
            debug!(item = %id, ?from, ?to, "status changed");
            observe(item);
            Ok(())
        });
        log_transition(id, to, &result);
        result
    }

    /// Block an item with a reason
    ///
    /// Re-blocking an already blocked item replaces the reason and keeps the
    /// state it will return to.
    ///
    /// # Errors
    /// - [`BacklogError::Validation`] for an empty reason
    /// - [`BacklogError::NotFound`] for an unknown id
    /// - [`BacklogError::IllegalTransition`] from BACKLOG, DONE or CANCELLED
    pub fn block(&self, id: WorkItemId, reason: &str) -> BacklogResult<WorkItem> {
        self.block_observed(id, reason, |_| {})
    }

    /// As [`WorkflowEngine::block`], calling `observe` while the store is
    /// still locked
    ///
    /// # Errors
    /// See [`WorkflowEngine::block`]
    pub fn block_observed<F>(&self, id: WorkItemId, reason: &str, observe: F) -> BacklogResult<WorkItem>
    where
        F: FnOnce(&WorkItem),
    {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BacklogError::Validation("blockage reason must not be empty".into()));
        }

        let result = self.store.try_update(id, |item| {
            let origin = match item.status {
                WorkItemStatus::Blocked => item.blocked_from,
                status if status.is_blockable() => Some(status),
                status => {
                    return Err(BacklogError::IllegalTransition {
                        from: status,
                        to: WorkItemStatus::Blocked,
                    })
                }
            };
            item.status = WorkItemStatus::Blocked;
            item.blocked = true;
            item.blockage_reason = Some(reason.to_string());
            item.blocked_from = origin;
            observe(item);
            Ok(())
        });

        match &result {
            Ok(_) => warn!(item = %id, reason, "work item blocked"),
            Err(err) => warn!(item = %id, error = %err, "block rejected"),
        }
        result
    }

    /// Return a blocked item to the state it was blocked from
    ///
    /// # Errors
    /// - [`BacklogError::NotFound`] for an unknown id
    /// - [`BacklogError::IllegalTransition`] if the item is not BLOCKED
    pub fn unblock(&self, id: WorkItemId) -> BacklogResult<WorkItem> {
        self.unblock_observed(id, |_| {})
    }

    /// As [`WorkflowEngine::unblock`], calling `observe` while the store is
    /// still locked
    ///
    /// # Errors
    /// See [`WorkflowEngine::unblock`]
    pub fn unblock_observed<F>(&self, id: WorkItemId, observe: F) -> BacklogResult<WorkItem>
    where
        F: FnOnce(&WorkItem),
    {
        let mut target = WorkItemStatus::Ready;
        let result = self.store.try_update(id, |item| match (item.status, item.blocked_from) {
            (WorkItemStatus::Blocked, Some(origin)) => {
                target = origin;
                apply_status(item, origin);
                debug!(item = %id, to = ?origin, "unblocked");
                observe(item);
                Ok(())
            }
            (status, _) => Err(BacklogError::IllegalTransition {
                from: status,
                to: WorkItemStatus::Ready,
            }),
        });
        log_transition(id, target, &result);
        result
    }
}

fn log_transition(id: WorkItemId, to: WorkItemStatus, result: &BacklogResult<WorkItem>) {
    match result {
        Ok(item) if item.status == WorkItemStatus::Done => {
            info!(item = %id, effort = %item.effort, "work item completed");
        }
        Ok(_) => {}
        Err(err) => warn!(item = %id, ?to, error = %err, "transition rejected"),
    }
}

/// Write `to` and the fields that depend on it
fn apply_status(item: &mut WorkItem, to: WorkItemStatus) {
    if item.status == WorkItemStatus::Blocked {
        item.blocked = false;
        item.blockage_reason = None;
        item.blocked_from = None;
    }
    if to == WorkItemStatus::Done {
        item.completed_at = Some(Utc::now());
    }
    item.status = to;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffortPolicy;
    use backlog_model::{NewWorkItem, Priority};

    fn setup() -> (Arc<WorkItemStore>, WorkflowEngine, WorkItemId) {
        let store = Arc::new(WorkItemStore::new());
        let item = store
            .create(NewWorkItem::new("story", 5, Priority::High), EffortPolicy::Strict)
            .unwrap();
        let engine = WorkflowEngine::new(Arc::clone(&store));
        (store, engine, item.id)
    }

    fn walk(engine: &WorkflowEngine, id: WorkItemId, path: &[WorkItemStatus]) {
        for &to in path {
            engine.transition(id, to).unwrap();
        }
    }

    #[test]
    fn happy_path_reaches_done() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        walk(&engine, id, &[Ready, InProgress, InReview, InTesting]);
        let done = engine.transition(id, Done).unwrap();
        assert_eq!(done.status, Done);
        assert!(done.completed_at.is_some());
        assert!(done.check_invariants().is_ok());
    }

    #[test]
    fn backlog_to_done_is_illegal() {
        let (store, engine, id) = setup();
        let err = engine.transition(id, WorkItemStatus::Done).unwrap_err();
        assert!(matches!(
            err,
            BacklogError::IllegalTransition {
                from: WorkItemStatus::Backlog,
                to: WorkItemStatus::Done
            }
        ));
        assert_eq!(store.get(id).unwrap().status, WorkItemStatus::Backlog);
    }

    #[test]
    fn same_state_transition_is_rejected() {
        let (_, engine, id) = setup();
        assert!(matches!(
            engine.transition(id, WorkItemStatus::Backlog),
            Err(BacklogError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn transition_to_blocked_requires_block() {
        let (_, engine, id) = setup();
        engine.transition(id, WorkItemStatus::Ready).unwrap();
        assert!(matches!(
            engine.transition(id, WorkItemStatus::Blocked),
            Err(BacklogError::Validation(_))
        ));
    }

    #[test]
    fn block_and_return_to_origin() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        walk(&engine, id, &[Ready, InProgress]);

        let blocked = engine.block(id, "waiting on the API team").unwrap();
        assert_eq!(blocked.status, Blocked);
        assert!(blocked.blocked);
        assert_eq!(blocked.blockage_reason.as_deref(), Some("waiting on the API team"));
        assert_eq!(blocked.blocked_from, Some(InProgress));

        // only the origin (or cancellation) is reachable
        assert!(engine.transition(id, InReview).is_err());
        assert!(engine.transition(id, Ready).is_err());

        let back = engine.transition(id, InProgress).unwrap();
        assert_eq!(back.status, InProgress);
        assert!(!back.blocked);
        assert_eq!(back.blockage_reason, None);
        assert!(back.check_invariants().is_ok());
    }

    #[test]
    fn reblock_keeps_origin() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        walk(&engine, id, &[Ready, InProgress, InReview]);
        engine.block(id, "reviewer away").unwrap();
        let again = engine.block(id, "reviewer still away").unwrap();
        assert_eq!(again.blocked_from, Some(InReview));
        assert_eq!(again.blockage_reason.as_deref(), Some("reviewer still away"));
    }

    #[test]
    fn unblock_returns_to_origin() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        walk(&engine, id, &[Ready]);
        engine.block(id, "env down").unwrap();
        assert_eq!(engine.unblock(id).unwrap().status, Ready);
        assert!(engine.unblock(id).is_err());
    }

    #[test]
    fn block_requires_reason() {
        let (_, engine, id) = setup();
        engine.transition(id, WorkItemStatus::Ready).unwrap();
        assert!(matches!(engine.block(id, "  "), Err(BacklogError::Validation(_))));
    }

    #[test]
    fn block_unknown_is_not_found() {
        let (_, engine, _) = setup();
        assert!(matches!(
            engine.block(WorkItemId(99), "reason"),
            Err(BacklogError::NotFound(_))
        ));
    }

    #[test]
    fn block_from_backlog_is_illegal() {
        let (_, engine, id) = setup();
        assert!(matches!(
            engine.block(id, "reason"),
            Err(BacklogError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn cancel_from_blocked_clears_blockage() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        walk(&engine, id, &[Ready]);
        engine.block(id, "deprioritized").unwrap();
        let cancelled = engine.transition(id, Cancelled).unwrap();
        assert_eq!(cancelled.status, Cancelled);
        assert_eq!(cancelled.blockage_reason, None);
        assert!(cancelled.check_invariants().is_ok());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        engine.transition(id, Cancelled).unwrap();
        for to in WorkItemStatus::ALL {
            assert!(engine.transition(id, to).is_err());
        }
        assert!(allowed_transitions(Done).is_empty());
    }

    #[test]
    fn observer_runs_only_for_applied_changes() {
        use WorkItemStatus::*;
        let (_, engine, id) = setup();
        let mut seen = Vec::new();

        assert!(engine.transition_observed(id, Done, |i| seen.push(i.status)).is_err());
        engine.transition_observed(id, Ready, |i| seen.push(i.status)).unwrap();
        engine.block_observed(id, "env down", |i| seen.push(i.status)).unwrap();
        engine.unblock_observed(id, |i| seen.push(i.status)).unwrap();
        assert!(engine.unblock_observed(id, |i| seen.push(i.status)).is_err());

        assert_eq!(seen, vec![Ready, Blocked, Ready]);
    }
}
