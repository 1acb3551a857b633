//! Capacity planning
//!
//! Selects unscheduled items for the current iteration within a target
//! effort. Candidates are ranked by priority (highest first, ties in id
//! order) and taken greedily: an item that does not fit is skipped and the
//! scan continues with smaller ones.

use crate::store::WorkItemStore;
use crate::velocity::VelocityTracker;
use backlog_model::{WorkItem, WorkItemStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one planning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationCommitment {
    /// Iteration the items were committed to
    pub iteration: u32,
    /// Capacity that was requested
    pub target_capacity: i64,
    /// Sum of committed effort, never above `target_capacity`
    pub committed_effort: u64,
    /// Committed items in selection order
    pub items: Vec<WorkItem>,
}

impl IterationCommitment {
    /// Nothing was committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of closing an iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationClose {
    /// Iteration that was closed
    pub iteration: u32,
    /// Effort recorded in the velocity history
    pub delivered_effort: u32,
    /// Items of the closed iteration that were not finished
    pub carried_over: usize,
}

/// Greedy capacity planner with an iteration cursor
#[derive(Debug)]
pub struct CapacityPlanner {
    store: Arc<WorkItemStore>,
    current: Mutex<u32>,
}

impl CapacityPlanner {
    /// Planner starting at `iteration`
    #[must_use]
    pub fn new(store: Arc<WorkItemStore>, iteration: u32) -> Self {
        Self {
            store,
            current: Mutex::new(iteration),
        }
    }

    /// Iteration new commitments go to
    #[must_use]
    pub fn current_iteration(&self) -> u32 {
        *self.current.lock()
    }

    /// Run `f` with the iteration cursor held, so no plan or close can
    /// interleave with it
    pub fn with_current_iteration<R>(&self, f: impl FnOnce(u32) -> R) -> R {
        let current = self.current.lock();
        f(*current)
    }

    /// Commit unscheduled BACKLOG and READY items to the current iteration
    ///
    /// A non-positive target or an empty candidate set yields an empty
    /// commitment. Committed items become READY.
    pub fn plan(&self, target_capacity: i64) -> IterationCommitment {
        self.plan_observed(target_capacity, |_| {})
    }

    /// As [`CapacityPlanner::plan`], calling `observe` with the commitment
    /// before the store is released
    pub fn plan_observed<F>(&self, target_capacity: i64, observe: F) -> IterationCommitment
    where
        F: FnOnce(&IterationCommitment),
    {
        let current = self.current.lock();
        let iteration = *current;

        let commitment = self.store.transaction(|txn| {
            let mut committed_effort = 0u64;
            let mut items = Vec::new();
            if target_capacity > 0 {
                let target = target_capacity.unsigned_abs();

                let mut candidates: Vec<_> = txn
                    .iter()
                    .filter(|item| item.is_plannable())
                    .map(|item| (item.priority, item.id, item.effort))
                    .collect();
                // stable: equal priorities keep id order
                candidates.sort_by_key(|&(priority, _, _)| Reverse(priority));

                for (_, id, effort) in candidates {
                    let points = u64::from(effort.points());
                    if committed_effort + points > target {
                        debug!(item = %id, effort = points, "skipped, over capacity");
                        continue;
                    }
                    committed_effort += points;
                    let item = txn.modify(id, |item| {
                        item.iteration = Some(iteration);
                        item.status = WorkItemStatus::Ready;
                    });
                    items.extend(item);
                }
            }

            let commitment = IterationCommitment {
                iteration,
                target_capacity,
                committed_effort,
                items,
            };
            observe(&commitment);
            commitment
        });

        info!(
            iteration,
            target_capacity,
            committed_effort = commitment.committed_effort,
            items = commitment.items.len(),
            "iteration planned"
        );
        commitment
    }

    /// Close the current iteration, recording the effort of its DONE items
    pub fn close_iteration(&self, velocity: &VelocityTracker) -> IterationClose {
        self.close_observed(velocity, None, |_| {})
    }

    /// Close the current iteration, recording `delivered` instead of the
    /// computed total
    pub fn close_iteration_with(&self, delivered: u32, velocity: &VelocityTracker) -> IterationClose {
        self.close_observed(velocity, Some(delivered), |_| {})
    }

    /// Close the current iteration
    ///
    /// DONE items of the iteration count towards its delivered effort unless
    /// `reported` overrides the total. Every unfinished, uncancelled item is
    /// moved to the next iteration so its effort counts when it is finished
    /// there. `observe` runs before the store is released.
    pub fn close_observed<F>(
        &self,
        velocity: &VelocityTracker,
        reported: Option<u32>,
        observe: F,
    ) -> IterationClose
    where
        F: FnOnce(&IterationClose),
    {
        let mut current = self.current.lock();
        let iteration = *current;
        let next = iteration.saturating_add(1);

        let close = self.store.transaction(|txn| {
            let mut done_effort = 0u32;
            let mut open = Vec::new();
            for item in txn.iter().filter(|item| item.iteration == Some(iteration)) {
                match item.status {
                    WorkItemStatus::Done => {
                        done_effort = done_effort.saturating_add(item.effort.points());
                    }
                    WorkItemStatus::Cancelled => {}
                    _ => open.push(item.id),
                }
            }
            for &id in &open {
                txn.modify(id, |item| item.iteration = Some(next));
                debug!(item = %id, to = next, "carried over");
            }

            let delivered_effort = reported.unwrap_or(done_effort);
            velocity.record_iteration_completion(delivered_effort);
            let close = IterationClose {
                iteration,
                delivered_effort,
                carried_over: open.len(),
            };
            observe(&close);
            close
        });
        *current = next;

        info!(
            iteration,
            delivered_effort = close.delivered_effort,
            carried_over = close.carried_over,
            "iteration closed"
        );
        close
    }
}
