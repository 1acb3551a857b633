//! Iteration status summaries

use crate::store::WorkItemStore;
use backlog_model::WorkItemStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-status counts and effort totals for one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSummary {
    /// Summarized iteration
    pub iteration: u32,
    /// Items assigned to the iteration
    pub total_items: usize,
    /// Effort of every assigned item
    pub committed_effort: u64,
    /// Effort of the DONE items
    pub delivered_effort: u64,
    /// Item count per status; every status is present
    pub counts: BTreeMap<WorkItemStatus, usize>,
}

impl IterationSummary {
    /// Items with `status`
    #[must_use]
    pub fn count(&self, status: WorkItemStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Items in progress
    #[must_use]
    pub fn in_progress(&self) -> usize {
        self.count(WorkItemStatus::InProgress)
    }

    /// Items blocked
    #[must_use]
    pub fn blocked(&self) -> usize {
        self.count(WorkItemStatus::Blocked)
    }

    /// Items done
    #[must_use]
    pub fn done(&self) -> usize {
        self.count(WorkItemStatus::Done)
    }
}

/// Read-only view computing [`IterationSummary`] values
#[derive(Debug, Clone)]
pub struct IterationStatusSummarizer {
    store: Arc<WorkItemStore>,
}

impl IterationStatusSummarizer {
    /// Summarizer over `store`
    #[must_use]
    pub fn new(store: Arc<WorkItemStore>) -> Self {
        Self { store }
    }

    /// Summarize iteration `n`; an unknown iteration gives all zeros
    #[must_use]
    pub fn summarize(&self, n: u32) -> IterationSummary {
        let items = self.store.list_by_iteration(n);
        let mut counts: BTreeMap<WorkItemStatus, usize> =
            WorkItemStatus::ALL.iter().map(|&s| (s, 0)).collect();
        let mut committed_effort = 0u64;
        let mut delivered_effort = 0u64;

        for item in &items {
            *counts.entry(item.status).or_default() += 1;
            let points = u64::from(item.effort.points());
            committed_effort += points;
            if item.status == WorkItemStatus::Done {
                delivered_effort += points;
            }
        }

        IterationSummary {
            iteration: n,
            total_items: items.len(),
            committed_effort,
            delivered_effort,
            counts,
        }
    }
}
