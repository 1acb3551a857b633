use crate::config::EngineConfig;
use crate::error::{BacklogError, BacklogResult};
use crate::journal::{Journal, JournalAction};
use crate::planner::{CapacityPlanner, IterationClose, IterationCommitment};
use crate::snapshot::{BacklogSnapshot, SNAPSHOT_VERSION};
use crate::store::WorkItemStore;
use crate::summary::{IterationStatusSummarizer, IterationSummary};
use crate::velocity::{VelocityReport, VelocityTracker};
use crate::workflow::WorkflowEngine;
use backlog_model::{Effort, NewWorkItem, WorkItem, WorkItemId, WorkItemStatus};
use std::sync::Arc;

/// Main backlog handle composing every engine component
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Journal events
/// are recorded while the store is still locked, so the journal order is the
/// order in which mutations were applied.
#[derive(Debug)]
pub struct BacklogHandle {
    config: EngineConfig,
    store: Arc<WorkItemStore>,
    workflow: WorkflowEngine,
    planner: CapacityPlanner,
    velocity: VelocityTracker,
    summarizer: IterationStatusSummarizer,
    journal: Journal,
}

impl BacklogHandle {
    /// Create a handle with default configuration
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let iteration = config.starting_iteration;
        Self::assemble(config, Arc::new(WorkItemStore::new()), iteration, Vec::new(), Journal::new())
    }

    /// Create a handle with custom configuration
    ///
    /// # Errors
    /// Returns [`BacklogError::Config`] if the configuration is invalid
    pub fn with_config(config: EngineConfig) -> BacklogResult<Self> {
        config.validate()?;
        let iteration = config.starting_iteration;
        let seed = config.seed_velocity.clone();
        Ok(Self::assemble(
            config,
            Arc::new(WorkItemStore::new()),
            iteration,
            seed,
            Journal::new(),
        ))
    }

    /// Rebuild a handle from a snapshot
    ///
    /// # Errors
    /// - [`BacklogError::Config`] for an invalid configuration
    /// - [`BacklogError::Validation`] for items that break an invariant or
    ///   share an id
    /// - [`BacklogError::Journal`] if the journal chain is broken
    pub fn restore(config: EngineConfig, snapshot: BacklogSnapshot) -> BacklogResult<Self> {
        config.validate()?;
        let store = WorkItemStore::from_items(snapshot.items, snapshot.next_id)?;
        let journal = Journal::from_events(snapshot.journal)?;
        tracing::info!(
            items = store.len(),
            iteration = snapshot.current_iteration,
            "backlog restored"
        );
        Ok(Self::assemble(
            config,
            Arc::new(store),
            snapshot.current_iteration,
            snapshot.velocity_history,
            journal,
        ))
    }

    fn assemble(
        config: EngineConfig,
        store: Arc<WorkItemStore>,
        iteration: u32,
        velocity_history: Vec<u32>,
        journal: Journal,
    ) -> Self {
        Self {
            workflow: WorkflowEngine::new(Arc::clone(&store)),
            planner: CapacityPlanner::new(Arc::clone(&store), iteration),
            velocity: VelocityTracker::with_history(config.history_limit, velocity_history),
            summarizer: IterationStatusSummarizer::new(Arc::clone(&store)),
            store,
            journal,
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Audit journal
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Create an item in BACKLOG
    ///
    /// # Errors
    /// [`BacklogError::Validation`] or [`BacklogError::InvalidEffort`]
    pub fn create_item(&self, fields: NewWorkItem) -> BacklogResult<WorkItem> {
        let item = self.store.create_observed(fields, self.config.effort_policy, |item| {
            self.journal.record(
                JournalAction::Created,
                Some(item.id),
                format!("{} ({} points, {})", item.title, item.effort, item.priority),
            );
        })?;
        tracing::info!(item = %item.id, effort = %item.effort, priority = %item.priority, "work item created");
        Ok(item)
    }

    /// Items of iteration `n`, or every item when `None`
    #[must_use]
    pub fn list_items(&self, iteration: Option<u32>) -> Vec<WorkItem> {
        match iteration {
            Some(n) => self.store.list_by_iteration(n),
            None => self.store.list_all(),
        }
    }

    /// Items with `status`
    #[must_use]
    pub fn list_by_status(&self, status: WorkItemStatus) -> Vec<WorkItem> {
        self.store.list_by_status(status)
    }

    /// Fetch one item
    ///
    /// # Errors
    /// [`BacklogError::NotFound`] for an unknown id
    pub fn get_item(&self, id: WorkItemId) -> BacklogResult<WorkItem> {
        self.store.get(id)
    }

    /// Move an item along the workflow
    ///
    /// # Errors
    /// See [`WorkflowEngine::transition`]
    pub fn transition(&self, id: WorkItemId, to: WorkItemStatus) -> BacklogResult<WorkItem> {
        self.workflow.transition_observed(id, to, |_| {
            self.journal
                .record(JournalAction::Transitioned, Some(id), format!("moved to {to}"));
        })
    }

    /// Block an item
    ///
    /// # Errors
    /// See [`WorkflowEngine::block`]
    pub fn block(&self, id: WorkItemId, reason: &str) -> BacklogResult<WorkItem> {
        self.workflow.block_observed(id, reason, |_| {
            self.journal
                .record(JournalAction::Blocked, Some(id), reason.trim().to_string());
        })
    }

    /// Return a blocked item to the state it left
    ///
    /// # Errors
    /// See [`WorkflowEngine::unblock`]
    pub fn unblock(&self, id: WorkItemId) -> BacklogResult<WorkItem> {
        self.workflow.unblock_observed(id, |item| {
            self.journal.record(
                JournalAction::Transitioned,
                Some(id),
                format!("unblocked to {}", item.status),
            );
        })
    }

    /// Mark an item as refined
    ///
    /// # Errors
    /// - [`BacklogError::NotFound`] for an unknown id
    /// - [`BacklogError::Validation`] for DONE or CANCELLED items
    pub fn groom(&self, id: WorkItemId) -> BacklogResult<WorkItem> {
        let item = self.store.try_update(id, |item| {
            ensure_open(item, "groom")?;
            item.groomed = true;
            self.journal.record(JournalAction::Groomed, Some(id), "groomed");
            Ok(())
        })?;
        tracing::debug!(item = %id, "work item groomed");
        Ok(item)
    }

    /// Set or clear the owner; a blank name clears it
    ///
    /// # Errors
    /// [`BacklogError::NotFound`] for an unknown id
    pub fn assign(&self, id: WorkItemId, assignee: Option<String>) -> BacklogResult<WorkItem> {
        let assignee = assignee
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let detail = assignee.clone().unwrap_or_else(|| "unassigned".into());
        let item = self.store.update(id, |item| {
            item.assignee = assignee;
            self.journal.record(JournalAction::Assigned, Some(id), detail);
        })?;
        tracing::debug!(item = %id, assignee = ?item.assignee, "work item assigned");
        Ok(item)
    }

    /// Change the effort estimate, snapping to the scale
    ///
    /// # Errors
    /// - [`BacklogError::NotFound`] for an unknown id
    /// - [`BacklogError::Validation`] for DONE or CANCELLED items
    pub fn re_estimate(&self, id: WorkItemId, raw: i64) -> BacklogResult<WorkItem> {
        let effort = Effort::normalize(raw);
        let item = self.store.try_update(id, |item| {
            ensure_open(item, "re-estimate")?;
            self.journal.record(
                JournalAction::ReEstimated,
                Some(id),
                format!("{} -> {effort} (requested {raw})", item.effort),
            );
            item.effort = effort;
            Ok(())
        })?;
        tracing::info!(item = %id, raw, %effort, "work item re-estimated");
        Ok(item)
    }

    /// Iteration new commitments go to
    #[must_use]
    pub fn current_iteration(&self) -> u32 {
        self.planner.current_iteration()
    }

    /// Commit backlog items to the current iteration within `target_capacity`
    pub fn plan_iteration(&self, target_capacity: i64) -> IterationCommitment {
        self.planner.plan_observed(target_capacity, |commitment| {
            self.journal.record(
                JournalAction::Planned,
                None,
                format!(
                    "iteration {}: {} items, {} of {} points",
                    commitment.iteration,
                    commitment.items.len(),
                    commitment.committed_effort,
                    target_capacity
                ),
            );
        })
    }

    /// Capacity used when none is given: the configured default, otherwise
    /// the recommended commitment over the configured window
    #[must_use]
    pub fn default_capacity(&self) -> i64 {
        self.config
            .default_capacity
            .unwrap_or_else(|| self.velocity(self.config.velocity_window).recommended)
    }

    /// Velocity statistics over the last `window` iterations
    #[must_use]
    pub fn velocity(&self, window: usize) -> VelocityReport {
        self.velocity.report(window)
    }

    /// Velocity history, oldest first
    #[must_use]
    pub fn velocity_history(&self) -> Vec<u32> {
        self.velocity.history()
    }

    /// Summary of the current iteration
    #[must_use]
    pub fn summarize_current(&self) -> IterationSummary {
        self.summarizer.summarize(self.current_iteration())
    }

    /// Summary of iteration `n`
    #[must_use]
    pub fn summarize(&self, n: u32) -> IterationSummary {
        self.summarizer.summarize(n)
    }

    /// Close the current iteration, recording the effort delivered in it
    pub fn close_iteration(&self) -> IterationClose {
        self.planner
            .close_observed(&self.velocity, None, |close| self.record_close(close))
    }

    /// Close the current iteration with a caller-reported delivered total
    pub fn close_iteration_with(&self, delivered: u32) -> IterationClose {
        self.planner
            .close_observed(&self.velocity, Some(delivered), |close| self.record_close(close))
    }

    fn record_close(&self, close: &IterationClose) {
        self.journal.record(
            JournalAction::IterationClosed,
            None,
            format!(
                "iteration {}: {} points delivered, {} carried over",
                close.iteration, close.delivered_effort, close.carried_over
            ),
        );
    }

    /// Capture the full engine state
    #[must_use]
    pub fn snapshot(&self) -> BacklogSnapshot {
        self.planner.with_current_iteration(|current_iteration| {
            self.store.transaction(|txn| BacklogSnapshot {
                version: SNAPSHOT_VERSION,
                current_iteration,
                next_id: self.store.next_id(),
                items: txn.iter().cloned().collect(),
                velocity_history: self.velocity.history(),
                journal: self.journal.events(),
            })
        })
    }
}

impl Default for BacklogHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_open(item: &WorkItem, action: &str) -> BacklogResult<()> {
    if item.status.is_terminal() {
        return Err(BacklogError::Validation(format!(
            "cannot {action} {} item {}",
            item.status, item.id
        )));
    }
    Ok(())
}
