//! Testing utilities for the backlog workspace
//!
//! Shared fixtures and assertions.

#![allow(missing_docs)]

use backlog_engine::{BacklogHandle, EngineConfig};
use backlog_model::{NewWorkItem, Priority, WorkItem, WorkItemId, WorkItemStatus};

/// Delivered totals of six finished iterations, oldest first
pub const REFERENCE_VELOCITY: [u32; 6] = [23, 18, 31, 15, 28, 22];

pub fn story(title: &str, effort: i64, priority: Priority) -> NewWorkItem {
    NewWorkItem::new(title, effort, priority)
        .with_story("team member", title.to_lowercase(), "the iteration goal is met")
        .with_acceptance_criteria(format!("{title} is demonstrated in review"))
}

/// Handle holding one item per `(effort, priority)` pair, ids in input order
pub fn handle_with(items: &[(i64, Priority)]) -> BacklogHandle {
    handle_with_config(EngineConfig::default(), items)
}

pub fn handle_with_config(config: EngineConfig, items: &[(i64, Priority)]) -> BacklogHandle {
    let handle = BacklogHandle::with_config(config).unwrap();
    for (n, &(effort, priority)) in items.iter().enumerate() {
        handle
            .create_item(story(&format!("Story {}", n + 1), effort, priority))
            .unwrap();
    }
    handle
}

/// Efforts 8, 5, 13, 3 at HIGH, HIGH, CRITICAL, LOW
pub fn reference_backlog() -> BacklogHandle {
    use Priority::*;
    handle_with(&[(8, High), (5, High), (13, Critical), (3, Low)])
}

/// Walk an item along the happy path until it reaches `target`
pub fn advance_to(handle: &BacklogHandle, id: WorkItemId, target: WorkItemStatus) -> WorkItem {
    use WorkItemStatus::*;
    let path = [Ready, InProgress, InReview, InTesting, Done];
    let mut item = handle.get_item(id).unwrap();
    for step in path {
        if item.status == target {
            break;
        }
        if path.iter().position(|&s| s == item.status) >= path.iter().position(|&s| s == step) {
            continue;
        }
        item = handle.transition(id, step).unwrap();
    }
    assert_eq!(item.status, target, "could not advance {id} to {target}");
    item
}

pub fn assert_all_invariants(handle: &BacklogHandle) {
    for item in handle.list_items(None) {
        assert!(
            item.check_invariants().is_ok(),
            "item {} breaks {:?}",
            item.id,
            item.check_invariants()
        );
    }
    assert!(handle.journal().verify_integrity().is_ok());
}
