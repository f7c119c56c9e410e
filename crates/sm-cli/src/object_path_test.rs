use super::*;
use sm_dax::DaxAnalyzer;

fn path(table: &str, member: Option<&str>) -> ObjectPath {
    ObjectPath {
        table: table.to_string(),
        member: member.map(str::to_string),
    }
}

#[test]
fn test_parse_forms() {
    assert_eq!(ObjectPath::parse("Sales").unwrap(), path("Sales", None));
    assert_eq!(ObjectPath::parse("Sales[Amount]").unwrap(), path("Sales", Some("Amount")));
    assert_eq!(
        ObjectPath::parse("'Sales Facts'[Net [EUR]]]").unwrap(),
        path("Sales Facts", Some("Net [EUR]"))
    );
    assert_eq!(ObjectPath::parse("'Bob''s'").unwrap(), path("Bob's", None));
}

#[test]
fn test_parse_rejects_malformed_paths() {
    assert!(ObjectPath::parse("Sales[Amount").is_err());
    assert!(ObjectPath::parse("'Sales[Amount]").is_err());
    assert!(ObjectPath::parse("[Amount]").is_err());
    assert!(ObjectPath::parse("Sales[]").is_err());
    assert!(ObjectPath::parse("'Sales'x").is_err());
}

#[test]
fn test_display_quotes_only_when_needed() {
    assert_eq!(path("Sales Facts", Some("Amount")).to_string(), "Sales Facts[Amount]");
    assert_eq!(path("Odd[Name", None).to_string(), "'Odd[Name'");
    assert_eq!(path("Sales", Some("Net [EUR]")).to_string(), "Sales[Net [EUR]]]");
}

#[test]
fn test_resolve_and_label() {
    let mut session = ModelSession::new(DaxAnalyzer);
    let sales = session.add_table("Sales").unwrap();
    let amount = session.add_column(sales, "Amount").unwrap();
    let readers = session.add_role("Readers").unwrap();
    let permission = session.add_table_permission(readers, sales, "TRUE").unwrap();

    assert_eq!(ObjectPath::parse("sales").unwrap().resolve(&session).unwrap(), sales);
    assert_eq!(ObjectPath::parse("Sales[AMOUNT]").unwrap().resolve(&session).unwrap(), amount);
    assert_eq!(ObjectPath::parse("Readers").unwrap().resolve(&session).unwrap(), readers);
    assert!(ObjectPath::parse("Sales[Qty]").unwrap().resolve(&session).is_err());
    assert!(ObjectPath::parse("Orders").unwrap().resolve(&session).is_err());

    assert_eq!(label(session.model(), amount), "Sales[Amount]");
    assert_eq!(label(session.model(), permission), "Table Permission 'Sales'");
}
