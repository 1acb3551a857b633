use backlog_engine::prelude::*;
use backlog_engine::JournalError;
use backlog_test_utils::{advance_to, assert_all_invariants, reference_backlog, story};
use pretty_assertions::assert_eq;

fn worked_backlog() -> BacklogHandle {
    let handle = reference_backlog();
    handle.plan_iteration(20);
    advance_to(&handle, WorkItemId(3), WorkItemStatus::Done);
    advance_to(&handle, WorkItemId(2), WorkItemStatus::InProgress);
    handle.block(WorkItemId(2), "awaiting design sign-off").unwrap();
    handle.close_iteration();
    handle.assign(WorkItemId(1), Some("mira".into())).unwrap();
    handle
}

#[test]
fn test_save_load_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backlog.json");

    let original = worked_backlog();
    let snapshot = original.snapshot();
    snapshot.save(&path).unwrap();

    let loaded = BacklogSnapshot::load(&path).unwrap();
    assert_eq!(loaded, snapshot);

    let restored = BacklogHandle::restore(EngineConfig::default(), loaded).unwrap();
    assert_eq!(restored.list_items(None), original.list_items(None));
    assert_eq!(restored.current_iteration(), 2);
    assert_eq!(restored.velocity_history(), vec![13]);
    assert_eq!(restored.journal().events(), original.journal().events());
    assert_all_invariants(&restored);

    // ids continue after the restored ones
    let next = restored
        .create_item(story("Follow-up", 2, Priority::Low))
        .unwrap();
    assert_eq!(next.id, WorkItemId(5));

    // blocked items remember their origin across a restore
    assert_eq!(
        restored.unblock(WorkItemId(2)).unwrap().status,
        WorkItemStatus::InProgress
    );
}

#[test]
fn test_restore_rejects_broken_item() {
    let mut snapshot = worked_backlog().snapshot();
    snapshot.items[0].completed_at = Some(chrono::Utc::now());

    let err = BacklogHandle::restore(EngineConfig::default(), snapshot).unwrap_err();
    assert!(matches!(err, BacklogError::Validation(_)));
}

#[test]
fn test_restore_rejects_duplicate_ids() {
    let mut snapshot = worked_backlog().snapshot();
    let copy = snapshot.items[0].clone();
    snapshot.items.push(copy);

    assert!(matches!(
        BacklogHandle::restore(EngineConfig::default(), snapshot),
        Err(BacklogError::Validation(_))
    ));
}

#[test]
fn test_restore_rejects_tampered_journal() {
    let mut snapshot = worked_backlog().snapshot();
    snapshot.journal[2].detail = "rewritten history".into();

    let err = BacklogHandle::restore(EngineConfig::default(), snapshot).unwrap_err();
    assert!(matches!(
        err,
        BacklogError::Journal(JournalError::IntegrityViolation { index: 2 })
    ));
    assert!(err.is_system_error());
}

#[test]
fn test_config_file_drives_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backlog.toml");
    std::fs::write(&path, "effort_policy = \"snap\"\nhistory_limit = 2\n").unwrap();
    let config = EngineConfig::load(&path).unwrap();

    let mut snapshot = worked_backlog().snapshot();
    snapshot.velocity_history = vec![10, 20, 30];
    let handle = BacklogHandle::restore(config, snapshot).unwrap();

    assert_eq!(handle.velocity_history(), vec![20, 30]);
    let snapped = handle.create_item(story("Odd size", 7, Priority::Medium)).unwrap();
    assert_eq!(snapped.effort.points(), 8);
}
