use super::*;
use crate::object::{ModelObject, ObjectData};
use crate::object_name::ObjectName;
use crate::test_utils::BraceAnalyzer;

struct Fixture {
    model: Model,
    index: DependencyIndex,
    sales: ObjectId,
    amount: ObjectId,
    total: ObjectId,
    report: ObjectId,
}

/// Sales[Amount] <- Total <- Report, plus Report referencing Amount qualified
fn fixture() -> Fixture {
    let mut model = Model::new();
    let add = |model: &mut Model, name: &str, data: ObjectData, expr: Option<&str>| {
        let id = model.allocate_id();
        let mut object = ModelObject::new(id, ObjectName::new(name), data);
        if let Some(expr) = expr {
            object.set_expression(ExpressionSlot::Expression, Some(expr.to_string()));
        }
        model.insert(object);
        id
    };

    let sales = add(&mut model, "Sales", ObjectData::Table, None);
    let amount = add(
        &mut model,
        "Amount",
        ObjectData::Column {
            table: sales,
            calculated: false,
            display_folder: String::new(),
        },
        None,
    );
    let measure = |table| ObjectData::Measure {
        table,
        display_folder: String::new(),
    };
    let total = add(&mut model, "Total", measure(sales), Some("SUM({Amount})"));
    let report = add(
        &mut model,
        "Report",
        measure(sales),
        Some("{Total} + {Sales.Amount}"),
    );

    let mut index = DependencyIndex::new();
    index.recompute(total, &[amount].into_iter().collect());
    index.recompute(report, &[total, amount].into_iter().collect());

    Fixture {
        model,
        index,
        sales,
        amount,
        total,
        report,
    }
}

fn rename(fx: &mut Fixture, id: ObjectId, new_name: &str) -> PendingRename {
    let object = fx.model.get(id).unwrap();
    let (kind, old) = (object.kind(), object.name.to_string());
    let pending = RenameFixupEngine.on_renamed(&fx.model, &fx.index, id, kind, &old, new_name);
    fx.model.get_mut(id).unwrap().name = ObjectName::new(new_name);
    pending
}

#[test]
fn test_snapshot_is_sorted_dependents() {
    let mut fx = fixture();
    let amount = fx.amount;
    let pending = rename(&mut fx, amount, "Revenue");
    assert_eq!(pending.dependents, vec![fx.total, fx.report]);
    assert_eq!(pending.old_name, "Amount");
}

#[test]
fn test_table_snapshot_includes_member_referrers() {
    let mut fx = fixture();
    let sales = fx.sales;
    let pending = rename(&mut fx, sales, "Orders");
    // Nothing references the table itself, but both measures spell it
    assert_eq!(pending.dependents, vec![fx.total, fx.report]);
}

#[test]
fn test_plan_rewrites_each_dependent() {
    let mut fx = fixture();
    let amount = fx.amount;
    let pending = rename(&mut fx, amount, "Revenue");
    let fixups = RenameFixupEngine.plan(&fx.model, &BraceAnalyzer, &pending);

    assert_eq!(
        fixups,
        vec![
            Fixup {
                target: fx.total,
                slot: ExpressionSlot::Expression,
                outcome: FixupOutcome::Rewritten("SUM({Revenue})".to_string()),
            },
            Fixup {
                target: fx.report,
                slot: ExpressionSlot::Expression,
                outcome: FixupOutcome::Rewritten("{Total} + {Sales.Revenue}".to_string()),
            },
        ]
    );
}

#[test]
fn test_plan_skips_unchanged_text() {
    let mut fx = fixture();
    let total = fx.total;
    let pending = rename(&mut fx, total, "Total Sales");
    let fixups = RenameFixupEngine.plan(&fx.model, &BraceAnalyzer, &pending);

    // Only Report spells Total
    assert_eq!(fixups.len(), 1);
    assert_eq!(fixups[0].target, fx.report);
}

#[test]
fn test_unparseable_rewrite_is_a_failure() {
    let mut fx = fixture();
    let amount = fx.amount;
    let pending = rename(&mut fx, amount, "Bad}Name");
    let fixups = RenameFixupEngine.plan(&fx.model, &BraceAnalyzer, &pending);

    assert_eq!(fixups.len(), 2);
    for fixup in fixups {
        match fixup.outcome {
            FixupOutcome::Failed(message) => {
                assert!(message.contains("renaming 'Amount' to 'Bad}Name'"), "{}", message);
                assert!(message.contains("left unchanged"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}

#[test]
fn test_deleted_dependent_is_skipped() {
    let mut fx = fixture();
    let amount = fx.amount;
    let pending = rename(&mut fx, amount, "Revenue");
    fx.model.remove(fx.report);

    let fixups = RenameFixupEngine.plan(&fx.model, &BraceAnalyzer, &pending);
    assert_eq!(fixups.len(), 1);
    assert_eq!(fixups[0].target, fx.total);
}

#[test]
fn test_member_rename_keeps_table_name_from_rename_time() {
    let mut fx = fixture();
    let (amount, sales) = (fx.amount, fx.sales);
    let pending = rename(&mut fx, amount, "Revenue");
    assert_eq!(pending.table_name.as_deref(), Some("Sales"));

    // The table is renamed later in the same batch; formulas still spell Sales
    rename(&mut fx, sales, "Shop");
    let fixups = RenameFixupEngine.plan(&fx.model, &BraceAnalyzer, &pending);
    assert_eq!(
        fixups[1].outcome,
        FixupOutcome::Rewritten("{Total} + {Sales.Revenue}".to_string())
    );
}

#[test]
fn test_table_rename_has_no_owning_table() {
    let mut fx = fixture();
    let sales = fx.sales;
    assert_eq!(rename(&mut fx, sales, "Shop").table_name, None);
}
