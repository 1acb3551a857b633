//! Backlog engine
//!
//! Work-item workflow, capacity planning and velocity tracking for
//! iteration-based teams:
//! 1. **Workflow**: items move BACKLOG → READY → IN_PROGRESS → IN_REVIEW →
//!    IN_TESTING → DONE, with BLOCKED and CANCELLED side states
//! 2. **Planning**: greedy, priority-ordered commitment within a capacity
//! 3. **Velocity**: delivered effort per iteration drives the next capacity
//!
//! # Quick Start
//!
//! ```rust
//! use backlog_engine::prelude::*;
//!
//! let backlog = BacklogHandle::new();
//! let item = backlog
//!     .create_item(NewWorkItem::new("Export burndown chart", 8, Priority::High))
//!     .unwrap();
//!
//! let plan = backlog.plan_iteration(20);
//! assert_eq!(plan.committed_effort, 8);
//!
//! backlog.transition(item.id, WorkItemStatus::InProgress).unwrap();
//! assert_eq!(backlog.summarize_current().in_progress(), 1);
//! ```

pub mod config;
pub mod error;
pub mod journal;
pub mod planner;
pub mod simulator;
pub mod snapshot;
pub mod store;
pub mod summary;
pub mod velocity;
pub mod workflow;

mod handle;

pub use config::{EffortPolicy, EngineConfig};
pub use error::{BacklogError, BacklogResult, JournalError};
pub use handle::BacklogHandle;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{EffortPolicy, EngineConfig};
    pub use crate::error::{BacklogError, BacklogResult};
    pub use crate::handle::BacklogHandle;
    pub use crate::journal::{Journal, JournalAction, JournalEvent};
    pub use crate::planner::{CapacityPlanner, IterationClose, IterationCommitment};
    pub use crate::snapshot::BacklogSnapshot;
    pub use crate::store::WorkItemStore;
    pub use crate::summary::{IterationStatusSummarizer, IterationSummary};
    pub use crate::velocity::{VelocityReport, VelocityTracker};
    pub use crate::workflow::WorkflowEngine;
    pub use backlog_model::{
        Effort, NewWorkItem, Priority, WorkItem, WorkItemId, WorkItemStatus,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
