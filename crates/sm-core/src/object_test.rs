use super::*;

fn measure(id: u64) -> ModelObject {
    ModelObject::new(
        ObjectId::from_raw(id),
        ObjectName::new("Total"),
        ObjectData::Measure {
            table: ObjectId::from_raw(1),
            display_folder: "Finance".to_string(),
        },
    )
}

#[test]
fn test_capabilities_by_kind() {
    assert!(ObjectKind::Measure.has_expression());
    assert!(ObjectKind::Measure.has_display_folder());
    assert!(ObjectKind::Measure.has_error_state());

    assert!(!ObjectKind::Hierarchy.has_expression());
    assert!(ObjectKind::Hierarchy.has_display_folder());

    assert!(ObjectKind::Partition.has_expression());
    assert!(!ObjectKind::Partition.has_display_folder());

    assert!(!ObjectKind::Relationship.has_error_state());
    assert!(!ObjectKind::Role.has_expression());
}

#[test]
fn test_table_members() {
    assert!(ObjectKind::Column.is_table_member());
    assert!(ObjectKind::Partition.is_table_member());
    assert!(!ObjectKind::Table.is_table_member());
    assert!(!ObjectKind::TablePermission.is_table_member());
}

#[test]
fn test_data_column_has_no_expression_slot() {
    let column = ModelObject::new(
        ObjectId::from_raw(2),
        ObjectName::new("Amount"),
        ObjectData::Column {
            table: ObjectId::from_raw(1),
            calculated: false,
            display_folder: String::new(),
        },
    );
    assert!(!column.supports_slot(ExpressionSlot::Expression));

    let calculated = ModelObject::new(
        ObjectId::from_raw(3),
        ObjectName::new("Margin"),
        ObjectData::Column {
            table: ObjectId::from_raw(1),
            calculated: true,
            display_folder: String::new(),
        },
    );
    assert!(calculated.supports_slot(ExpressionSlot::Expression));
    assert!(!calculated.supports_slot(ExpressionSlot::DetailRows));
}

#[test]
fn test_home_and_parent_table() {
    let m = measure(5);
    assert_eq!(m.parent_table(), Some(ObjectId::from_raw(1)));
    assert_eq!(m.home_table(), Some(ObjectId::from_raw(1)));

    let table = ModelObject::new(ObjectId::from_raw(1), ObjectName::new("Sales"), ObjectData::Table);
    assert_eq!(table.parent_table(), None);
    assert_eq!(table.home_table(), Some(ObjectId::from_raw(1)));
}

#[test]
fn test_expression_set_and_clear() {
    let mut m = measure(5);
    m.set_expression(ExpressionSlot::Expression, Some("1".to_string()));
    assert_eq!(m.expression(ExpressionSlot::Expression), Some("1"));
    m.set_expression(ExpressionSlot::Expression, None);
    assert_eq!(m.expression(ExpressionSlot::Expression), None);
}

#[test]
fn test_error_slots_combined() {
    let mut errors = ErrorSlots::default();
    assert!(errors.is_empty());
    assert_eq!(errors.combined(), None);

    errors.set(ErrorSlot::Expression, Some("bad ref".to_string()));
    errors.set(ErrorSlot::External, Some("server says no".to_string()));
    assert_eq!(errors.combined().as_deref(), Some("bad ref\nserver says no"));

    // Blank messages are treated as no error
    errors.set(ErrorSlot::External, Some("  ".to_string()));
    assert_eq!(errors.get(ErrorSlot::External), None);
}

#[test]
fn test_describe() {
    assert_eq!(measure(5).describe(), "Measure 'Total'");
    assert_eq!(ObjectKind::TablePermission.to_string(), "Table Permission");
}
