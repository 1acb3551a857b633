//! BacklogHandle Tests
//!
//! End-to-end flows through the facade: creation, workflow, planning,
//! summaries, iteration close and the audit journal.
//!
use backlog_engine::prelude::*;
use backlog_test_utils::{advance_to, assert_all_invariants, handle_with, reference_backlog, story};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

#[test]
fn test_create_item_defaults() {
    let handle = BacklogHandle::new();
    let item = handle
        .create_item(story("Export burndown", 5, Priority::High))
        .unwrap();

    assert_eq!(item.id, WorkItemId(1));
    assert_eq!(item.status, WorkItemStatus::Backlog);
    assert_eq!(item.iteration, None);
    assert!(!item.groomed);
    assert!(!item.blocked);
    assert_eq!(item.requester_role, "team member");
    assert_eq!(handle.get_item(item.id).unwrap(), item);
}

#[test]
fn test_strict_policy_rejects_off_scale_effort() {
    let handle = BacklogHandle::new();
    let err = handle
        .create_item(story("Odd size", 4, Priority::Low))
        .unwrap_err();
    assert!(matches!(err, BacklogError::InvalidEffort(4)));
    assert!(handle.list_items(None).is_empty());
}

#[test]
fn test_snap_policy_normalizes_effort() {
    let config = EngineConfig::new().with_effort_policy(EffortPolicy::Snap);
    let handle = BacklogHandle::with_config(config).unwrap();
    for (raw, expected) in [(7, 8), (15, 13), (4, 3), (0, 1), (250, 100)] {
        let item = handle.create_item(story("Sized", raw, Priority::Low)).unwrap();
        assert_eq!(item.effort.points(), expected, "raw effort {raw}");
    }
}

#[test]
fn test_blank_title_is_validation_error() {
    let handle = BacklogHandle::new();
    assert!(matches!(
        handle.create_item(NewWorkItem::new("   ", 3, Priority::Low)),
        Err(BacklogError::Validation(_))
    ));
}

#[test]
fn test_unknown_item_is_not_found() {
    let handle = BacklogHandle::new();
    assert!(matches!(
        handle.get_item(WorkItemId(7)),
        Err(BacklogError::NotFound(_))
    ));
    assert!(matches!(
        handle.transition(WorkItemId(7), WorkItemStatus::Ready),
        Err(BacklogError::NotFound(_))
    ));
}

#[test]
fn test_full_iteration_flow() {
    let handle = reference_backlog();
    let plan = handle.plan_iteration(20);
    assert_eq!(plan.committed_effort, 18);

    advance_to(&handle, WorkItemId(3), WorkItemStatus::InProgress);
    advance_to(&handle, WorkItemId(2), WorkItemStatus::InReview);
    handle.block(WorkItemId(2), "reviewer on leave").unwrap();

    let summary = handle.summarize_current();
    assert_eq!(summary.iteration, 1);
    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.in_progress(), 1);
    assert_eq!(summary.blocked(), 1);
    assert_eq!(summary.done(), 0);

    handle.unblock(WorkItemId(2)).unwrap();
    advance_to(&handle, WorkItemId(2), WorkItemStatus::Done);
    advance_to(&handle, WorkItemId(3), WorkItemStatus::Done);

    let summary = handle.summarize(1);
    assert_eq!(summary.done(), 2);
    assert_eq!(summary.delivered_effort, 18);

    let close = handle.close_iteration();
    assert_eq!(close.delivered_effort, 18);
    assert_eq!(close.carried_over, 0);
    assert_eq!(handle.current_iteration(), 2);

    let velocity = handle.velocity(3);
    assert_eq!(velocity.iterations_analyzed, 1);
    assert!((velocity.average - 18.0).abs() < f64::EPSILON);
    assert_eq!(velocity.recommended, 16);

    assert_all_invariants(&handle);
}

#[test]
fn test_list_items_by_iteration() {
    let handle = reference_backlog();
    handle.plan_iteration(20);
    assert_eq!(handle.list_items(None).len(), 4);

    let ids: Vec<_> = handle.list_items(Some(1)).iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![WorkItemId(2), WorkItemId(3)]);
    assert!(handle.list_items(Some(2)).is_empty());
    assert_eq!(handle.list_by_status(WorkItemStatus::Backlog).len(), 2);
}

#[test]
fn test_groom_assign_re_estimate() {
    let handle = handle_with(&[(5, Priority::Medium)]);
    let id = WorkItemId(1);

    assert!(handle.groom(id).unwrap().groomed);
    assert_eq!(
        handle.assign(id, Some(" dana ".into())).unwrap().assignee.as_deref(),
        Some("dana")
    );
    assert_eq!(handle.re_estimate(id, 70).unwrap().effort.points(), 40);

    let actions: Vec<_> = handle
        .journal()
        .events_for(id)
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            JournalAction::Created,
            JournalAction::Groomed,
            JournalAction::Assigned,
            JournalAction::ReEstimated,
        ]
    );
}

#[test]
fn test_cannot_groom_finished_item() {
    let handle = handle_with(&[(5, Priority::Medium)]);
    advance_to(&handle, WorkItemId(1), WorkItemStatus::Done);
    assert!(matches!(
        handle.groom(WorkItemId(1)),
        Err(BacklogError::Validation(_))
    ));
}

#[test]
fn test_concurrent_creates_get_unique_ids() {
    let handle = Arc::new(BacklogHandle::new());
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                (0..25)
                    .map(|n| {
                        handle
                            .create_item(story(&format!("t{t} n{n}"), 1, Priority::Low))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<WorkItemId> = threads
        .into_iter()
        .flat_map(|t| t.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(handle.journal().len(), 200);
    assert!(handle.journal().verify_integrity().is_ok());
}

#[test]
fn test_concurrent_transitions_stay_consistent() {
    let items: Vec<(i64, Priority)> = (0..20).map(|_| (2, Priority::High)).collect();
    let handle = Arc::new(handle_with(&items));
    handle.plan_iteration(40);

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                for id in 1..=20 {
                    let _ = handle.transition(WorkItemId(id), WorkItemStatus::InProgress);
                    let _ = handle.block(WorkItemId(id), "contention");
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_all_invariants(&handle);
    let summary = handle.summarize_current();
    assert_eq!(summary.blocked(), 20);
}

#[test]
fn test_journal_order_matches_applied_order() {
    use WorkItemStatus::*;
    let path = [Ready, InProgress, InReview, InTesting, Done];
    let items: Vec<(i64, Priority)> = (0..20).map(|_| (1, Priority::Medium)).collect();
    let handle = Arc::new(handle_with(&items));

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                for id in 1..=20 {
                    for to in path {
                        let _ = handle.transition(WorkItemId(id), to);
                    }
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let expected: Vec<String> = path.iter().map(|to| format!("moved to {to}")).collect();
    for id in 1..=20 {
        let moves: Vec<String> = handle
            .journal()
            .events_for(WorkItemId(id))
            .into_iter()
            .filter(|e| e.action == JournalAction::Transitioned)
            .map(|e| e.detail)
            .collect();
        assert_eq!(moves, expected, "journal of item {id}");
    }
    assert_all_invariants(&handle);
}
