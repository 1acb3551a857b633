//! Backlog data model
//!
//! Strongly-typed building blocks shared by the planning engine:
//!
//! - [`WorkItem`]: the unit of plannable work, keyed by [`WorkItemId`]
//! - [`NewWorkItem`]: caller-supplied fields for a new item
//! - [`Effort`]: size estimate restricted to `1, 2, 3, 5, 8, 13, 21, 40, 100`
//! - [`Priority`]: `LOW` through `EXISTENTIAL`, ordered
//! - [`WorkItemStatus`]: the workflow board states
//!
//! # Example
//!
//! ```rust
//! use backlog_model::{Effort, NewWorkItem, Priority};
//!
//! assert_eq!(Effort::normalize(7).points(), 8);
//!
//! let fields = NewWorkItem::new("Export burndown chart", 5, Priority::High)
//!     .with_story("team lead", "export the burndown", "share it with stakeholders");
//! assert!(fields.validate().is_ok());
//! ```

#![warn(unreachable_pub)]

mod effort;
mod error;
mod item;
mod priority;
mod status;

pub use effort::Effort;
pub use error::{InvariantViolation, ModelError};
pub use item::{NewWorkItem, WorkItem, WorkItemId};
pub use priority::Priority;
pub use status::WorkItemStatus;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
