use super::*;
use crate::object_name::ObjectName;

fn change(n: u64) -> Change {
    Change::Name {
        id: ObjectId::from_raw(n),
        old: ObjectName::new("a"),
        new: ObjectName::new("b"),
    }
}

#[test]
fn test_only_outermost_end_closes() {
    let mut tx = TransactionCoordinator::new();
    assert!(tx.begin("outer", false));
    assert!(!tx.begin("inner", false));
    assert_eq!(tx.depth(), 2);

    assert!(!tx.end().unwrap());
    assert!(tx.end().unwrap());
    // Still open until finished, so close-time passes join the batch
    assert!(tx.is_open());
    assert_eq!(tx.label(), Some("outer"));

    let batch = tx.finish();
    assert_eq!(batch.label, "outer");
    assert!(!tx.is_open());
}

#[test]
fn test_end_without_begin() {
    let mut tx = TransactionCoordinator::new();
    assert!(matches!(tx.end(), Err(CoreError::NoOpenBatch)));
}

#[test]
fn test_finish_resets_state() {
    let mut tx = TransactionCoordinator::new();
    tx.begin("batch", false);
    tx.record(change(1));
    tx.mark_stale(ObjectId::from_raw(1));
    tx.mark_dirty(ObjectId::from_raw(2));
    tx.mark_names_changed();
    tx.record_fixup_failure(ObjectId::from_raw(3), "boom".to_string());

    let batch = tx.finish();
    assert_eq!(batch.changes.len(), 1);
    assert!(tx.stale_objects().is_empty());
    assert!(tx.dirty_tables().is_empty());
    assert!(!tx.names_changed());
    assert!(tx.fixup_failure(ObjectId::from_raw(3)).is_none());
}

#[test]
fn test_closed_batch_into_action() {
    let empty = ClosedBatch {
        label: "nothing".to_string(),
        implicit: true,
        changes: vec![],
    };
    assert!(empty.into_action().is_none());

    let implicit_single = ClosedBatch {
        label: "Rename".to_string(),
        implicit: true,
        changes: vec![change(1)],
    };
    assert!(matches!(
        implicit_single.into_action(),
        Some(UndoAction::Single(_))
    ));

    let explicit_single = ClosedBatch {
        label: "My batch".to_string(),
        implicit: false,
        changes: vec![change(1)],
    };
    match explicit_single.into_action() {
        Some(UndoAction::Composite { label, changes }) => {
            assert_eq!(label, "My batch");
            assert_eq!(changes.len(), 1);
        }
        other => panic!("expected composite, got {:?}", other),
    }
}

#[test]
fn test_replay_mode() {
    let mut tx = TransactionCoordinator::new();
    assert_eq!(tx.mode(), CoordinatorMode::Recording);
    tx.enter_replay();
    assert!(tx.is_replaying());
    tx.exit_replay();
    assert!(!tx.is_replaying());
}
