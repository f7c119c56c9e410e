use super::*;
use sm_core::{ExpressionSlot, ModelSession, SessionConfig};
use std::collections::BTreeSet;

struct Fixture {
    session: ModelSession,
    sales: ObjectId,
    amount: ObjectId,
    qty: ObjectId,
    total: ObjectId,
    dates: ObjectId,
}

/// Sales(Amount, Qty, Total = SUM(Sales[Amount])), Dates; fixups off so
/// formulas keep their old spelling after a rename
fn fixture() -> Fixture {
    let config = SessionConfig {
        formula_fixup: false,
        ..SessionConfig::default()
    };
    let mut session = ModelSession::with_config(DaxAnalyzer, config);
    let sales = session.add_table("Sales").unwrap();
    let amount = session.add_column(sales, "Amount").unwrap();
    let qty = session.add_column(sales, "Qty").unwrap();
    let total = session
        .add_measure(sales, "Total", "SUM(Sales[Amount])")
        .unwrap();
    let dates = session.add_table("Dates").unwrap();
    Fixture {
        session,
        sales,
        amount,
        qty,
        total,
        dates,
    }
}

fn scope(session: &ModelSession, owner: ObjectId) -> ExpressionScope<'_> {
    ExpressionScope {
        model: session.model(),
        owner,
        home_table: session.object(owner).unwrap().home_table(),
        slot: ExpressionSlot::Expression,
    }
}

fn analyze(fx: &Fixture, text: &str) -> Analysis {
    DaxAnalyzer
        .analyze(text, &scope(&fx.session, fx.total))
        .unwrap()
}

/// Rename `id` in the model, then rewrite `text` as a formula of `owner`
fn rewrite_after_rename(fx: &mut Fixture, owner: ObjectId, id: ObjectId, new_name: &str, text: &str) -> String {
    let object = fx.session.object(id).unwrap();
    let (kind, old_name) = (object.kind(), object.name.to_string());
    fx.session.rename(id, new_name).unwrap();

    let table_name = object_table_name(&fx.session, id);
    let renamed = RenamedObject {
        id,
        kind,
        old_name: &old_name,
        new_name,
        table_name: table_name.as_deref(),
    };
    DaxAnalyzer
        .rewrite(text, &scope(&fx.session, owner), &renamed)
        .unwrap()
}

fn object_table_name(session: &ModelSession, id: ObjectId) -> Option<String> {
    let table = session.object(id).ok()?.parent_table()?;
    Some(session.object(table).ok()?.name.to_string())
}

#[test]
fn test_resolves_qualified_unqualified_and_tables() {
    let fx = fixture();
    let analysis = analyze(
        &fx,
        "CALCULATE([Total] + 'Sales'[Qty] * [Amount], ALL(Dates), COUNTROWS(sales))",
    );
    assert_eq!(
        analysis.references,
        BTreeSet::from([fx.sales, fx.amount, fx.qty, fx.total, fx.dates])
    );
    assert!(analysis.diagnostics.is_empty());
}

#[test]
fn test_qualified_measure_reference() {
    let fx = fixture();
    let analysis = analyze(&fx, "Dates[Total]");
    assert_eq!(analysis.references, BTreeSet::from([fx.total]));
}

#[test]
fn test_unresolved_references_become_diagnostics() {
    let fx = fixture();
    let analysis = analyze(&fx, "Orders[Id] + Sales[Missing] + [Nothing] + Budget");
    assert_eq!(
        analysis.diagnostics,
        vec![
            "Cannot find table 'Orders'",
            "Cannot find column 'Sales'[Missing]",
            "Cannot find column or measure '[Nothing]'",
            "Cannot find table 'Budget'",
        ]
    );
    assert!(analysis.references.is_empty());
}

#[test]
fn test_unqualified_column_needs_home_table() {
    let fx = fixture();
    let analysis = DaxAnalyzer
        .analyze("[Amount]", &scope(&fx.session, fx.dates))
        .unwrap();
    assert_eq!(
        analysis.error_message().as_deref(),
        Some("Cannot find column or measure '[Amount]'")
    );
}

#[test]
fn test_variables_do_not_resolve() {
    let fx = fixture();
    let analysis = analyze(&fx, "VAR Sales = [Total] RETURN Sales * 2");
    assert_eq!(analysis.references, BTreeSet::from([fx.total]));
}

#[test]
fn test_syntax_error() {
    let fx = fixture();
    let err = DaxAnalyzer
        .analyze("SUM(Sales[Amount]", &scope(&fx.session, fx.total))
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::Syntax { offset: 3, .. }));
}

#[test]
fn test_table_rename_requotes_when_needed() {
    let mut fx = fixture();
    let (total, sales) = (fx.total, fx.sales);
    let out = rewrite_after_rename(
        &mut fx,
        total,
        sales,
        "Sales 2024",
        "SUM(Sales[Amount]) + COUNTROWS(sales)",
    );
    assert_eq!(out, "SUM('Sales 2024'[Amount]) + COUNTROWS('Sales 2024')");
}

#[test]
fn test_table_rename_keeps_quotes() {
    let mut fx = fixture();
    let (total, sales) = (fx.total, fx.sales);
    let out = rewrite_after_rename(&mut fx, total, sales, "Orders", "SUM('Sales'[Amount])");
    assert_eq!(out, "SUM('Orders'[Amount])");
}

#[test]
fn test_column_rename_escapes_brackets() {
    let mut fx = fixture();
    let (total, amount) = (fx.total, fx.amount);
    let out = rewrite_after_rename(
        &mut fx,
        total,
        amount,
        "Amount [EUR]",
        "SUM(Sales[Amount]) /* Amount */ + [amount] + Dates[Amount]",
    );
    assert_eq!(
        out,
        "SUM(Sales[Amount [EUR]]]) /* Amount */ + [Amount [EUR]]] + Dates[Amount]"
    );
}

#[test]
fn test_column_rename_leaves_other_tables_alone() {
    let mut fx = fixture();
    let (dates, amount) = (fx.dates, fx.amount);
    // In a formula homed on Dates, [Amount] never meant Sales[Amount]
    let out = rewrite_after_rename(&mut fx, dates, amount, "Revenue", "[Amount] + Sales[Amount]");
    assert_eq!(out, "[Amount] + Sales[Revenue]");
}

#[test]
fn test_measure_rename_rewrites_every_spelling() {
    let mut fx = fixture();
    let (dates, total) = (fx.dates, fx.total);
    let out = rewrite_after_rename(&mut fx, dates, total, "Total Sales", "[Total] * 2 + Sales[TOTAL]");
    assert_eq!(out, "[Total Sales] * 2 + Sales[Total Sales]");
}

#[test]
fn test_measure_rename_through_other_table() {
    let mut fx = fixture();
    let (dates, total) = (fx.dates, fx.total);
    let out = rewrite_after_rename(&mut fx, dates, total, "Grand", "Dates[Total] * 2 + Nowhere[Total]");
    assert_eq!(out, "Dates[Grand] * 2 + Nowhere[Total]");
}

#[test]
fn test_measure_rename_skips_same_named_column() {
    let mut fx = fixture();
    let (dates, total) = (fx.dates, fx.total);
    fx.session.add_column(dates, "Total").unwrap();
    // Dates[Total] is the column, not the measure
    let out = rewrite_after_rename(&mut fx, dates, total, "Grand", "Dates[Total] + Sales[Total]");
    assert_eq!(out, "Dates[Total] + Sales[Grand]");
}

#[test]
fn test_quote_table() {
    assert_eq!(quote_table("Sales", false), "Sales");
    assert_eq!(quote_table("Sales", true), "'Sales'");
    assert_eq!(quote_table("Bob's Table", false), "'Bob''s Table'");
    assert_eq!(quote_table("2024", false), "'2024'");
    assert_eq!(quote_table("Return", false), "'Return'");
}
