use backlog_engine::prelude::*;
use backlog_engine::workflow::{allowed_transitions, validate_transition};
use backlog_test_utils::{advance_to, handle_with};
use proptest::prelude::*;

fn any_status() -> impl Strategy<Value = WorkItemStatus> {
    prop_oneof![
        Just(WorkItemStatus::Backlog),
        Just(WorkItemStatus::Ready),
        Just(WorkItemStatus::InProgress),
        Just(WorkItemStatus::Blocked),
        Just(WorkItemStatus::InReview),
        Just(WorkItemStatus::InTesting),
        Just(WorkItemStatus::Done),
        Just(WorkItemStatus::Cancelled),
    ]
}

#[test]
fn test_backlog_transitions() {
    assert!(validate_transition(WorkItemStatus::Backlog, WorkItemStatus::Ready).is_ok());
    assert!(validate_transition(WorkItemStatus::Backlog, WorkItemStatus::Cancelled).is_ok());

    // Invalid
    assert!(validate_transition(WorkItemStatus::Backlog, WorkItemStatus::Done).is_err());
    assert!(validate_transition(WorkItemStatus::Backlog, WorkItemStatus::InProgress).is_err());
    assert!(validate_transition(WorkItemStatus::Backlog, WorkItemStatus::Blocked).is_err());
}

#[test]
fn test_blocked_static_edges() {
    // the return edge depends on the item
    assert_eq!(
        allowed_transitions(WorkItemStatus::Blocked),
        vec![WorkItemStatus::Cancelled]
    );
}

#[test]
fn test_backlog_to_done_is_illegal_transition() {
    let handle = handle_with(&[(5, Priority::High)]);
    let err = handle
        .transition(WorkItemId(1), WorkItemStatus::Done)
        .unwrap_err();
    assert!(matches!(
        err,
        BacklogError::IllegalTransition {
            from: WorkItemStatus::Backlog,
            to: WorkItemStatus::Done
        }
    ));
    assert!(err.is_client_error());
}

#[test]
fn test_completion_timestamp_follows_done() {
    let handle = handle_with(&[(5, Priority::High)]);
    let id = WorkItemId(1);
    let testing = advance_to(&handle, id, WorkItemStatus::InTesting);
    assert!(testing.completed_at.is_none());

    let done = handle.transition(id, WorkItemStatus::Done).unwrap();
    assert!(done.completed_at.is_some());
    assert!(done.updated_at >= testing.updated_at);
}

#[test]
fn test_block_from_each_working_state() {
    use WorkItemStatus::*;
    for origin in [Ready, InProgress, InReview, InTesting] {
        let handle = handle_with(&[(3, Priority::Medium)]);
        let id = WorkItemId(1);
        advance_to(&handle, id, origin);

        let blocked = handle.block(id, "external dependency").unwrap();
        assert_eq!(blocked.blocked_from, Some(origin));
        assert!(blocked.check_invariants().is_ok());

        let back = handle.unblock(id).unwrap();
        assert_eq!(back.status, origin);
        assert!(back.blockage_reason.is_none());
    }
}

#[test]
fn test_block_unknown_item() {
    let handle = handle_with(&[]);
    assert!(matches!(
        handle.block(WorkItemId(42), "reason"),
        Err(BacklogError::NotFound(WorkItemId(42)))
    ));
}

proptest! {
    #[test]
    fn prop_validate_matches_allowed(from in any_status(), to in any_status()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);
        prop_assert_eq!(res.is_ok(), allowed.contains(&to));
    }

    #[test]
    fn prop_same_state_is_rejected(status in any_status()) {
        prop_assert!(validate_transition(status, status).is_err());
    }

    #[test]
    fn prop_terminal_states_are_final(to in any_status()) {
        prop_assert!(validate_transition(WorkItemStatus::Done, to).is_err());
        prop_assert!(validate_transition(WorkItemStatus::Cancelled, to).is_err());
    }

    #[test]
    fn prop_random_requests_keep_invariants(
        requests in proptest::collection::vec(any_status(), 1..40)
    ) {
        let handle = handle_with(&[(8, Priority::High)]);
        let id = WorkItemId(1);
        for to in requests {
            let before = handle.get_item(id).unwrap();
            let result = if to == WorkItemStatus::Blocked {
                handle.block(id, "random block")
            } else {
                handle.transition(id, to)
            };
            let after = handle.get_item(id).unwrap();
            prop_assert!(after.check_invariants().is_ok());
            if result.is_err() {
                prop_assert_eq!(&before, &after);
            }
        }
    }
}
