use super::*;
use sm_dax::DaxAnalyzer;
use tempfile::tempdir;

const SAMPLE: &str = r#"
tables:
  - name: Sales
    columns:
      - name: Amount
      - name: CustomerId
      - name: Margin
        expression: Sales[Amount] * 0.2
        display_folder: Finance
    measures:
      - name: Total
        expression: SUM(Sales[Amount])
        display_folder: Finance/Totals
      - name: Per Customer
        expression: DIVIDE([Total], [Customers])
    partitions:
      - name: Sales-2024
        expression: Source
  - name: Customer
    columns:
      - name: Id
      - name: Region
      - name: City
    measures:
      - name: Customers
        expression: COUNTROWS(Customer)
    hierarchies:
      - name: Geography
        levels: [Region, City]
relationships:
  - from: Sales[CustomerId]
    to: Customer[Id]
roles:
  - name: Readers
    permissions:
      - table: Customer
        filter: Customer[Region] = "West"
"#;

fn load(yaml: &str) -> Result<ModelSession> {
    let mut session = ModelSession::new(DaxAnalyzer);
    ModelFile::from_yaml_str(yaml)?.build(&mut session)?;
    Ok(session)
}

fn id_of(session: &ModelSession, path: &str) -> ObjectId {
    ObjectPath::parse(path).unwrap().resolve(session).unwrap()
}

#[test]
fn test_build_creates_objects_in_one_batch() {
    let session = load(SAMPLE).unwrap();
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.undo_label().as_deref(), Some("Load model"));

    let total = id_of(&session, "Sales[Total]");
    let amount = id_of(&session, "Sales[Amount]");
    assert!(session.dependencies().has_edge(total, amount));

    // Forward reference to a measure of a table declared later
    let per_customer = id_of(&session, "Sales[Per Customer]");
    let customers = id_of(&session, "Customer[Customers]");
    assert!(session.dependencies().has_edge(per_customer, customers));
    assert_eq!(session.error_state(per_customer).unwrap(), None);

    assert_eq!(session.model().objects_of_kind(ObjectKind::Relationship).count(), 1);
    assert_eq!(session.model().objects_of_kind(ObjectKind::TablePermission).count(), 1);
}

#[test]
fn test_export_reproduces_the_file() {
    let session = load(SAMPLE).unwrap();
    let exported = ModelFile::from_session(&session);
    assert_eq!(exported, ModelFile::from_yaml_str(SAMPLE).unwrap());
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.yml");
    let session = load(SAMPLE).unwrap();

    ModelFile::from_session(&session).save(&path).unwrap();
    let reloaded = ModelFile::load(&path).unwrap();
    assert_eq!(reloaded.tables.len(), 2);
    assert_eq!(reloaded.relationships[0].from, "Sales[CustomerId]");
}

#[test]
fn test_empty_file_is_an_empty_model() {
    let session = load("  \n").unwrap();
    assert_eq!(session.objects().count(), 0);
}

#[test]
fn test_unknown_fields_are_rejected() {
    let err = ModelFile::from_yaml_str("tables:\n  - name: Sales\n    colums: []\n").unwrap_err();
    assert!(err.to_string().contains("colums"), "{}", err);
}

#[test]
fn test_unknown_hierarchy_level() {
    let yaml = r#"
tables:
  - name: Geo
    columns:
      - name: Region
    hierarchies:
      - name: H
        levels: [Region, Town]
"#;
    let err = load(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("unknown column 'Town'"), "{:#}", err);
}

#[test]
fn test_unknown_relationship_end() {
    let yaml = r#"
tables:
  - name: Sales
    columns:
      - name: Amount
relationships:
  - from: Sales[Amount]
    to: Orders[Id]
"#;
    let err = load(yaml).unwrap_err();
    assert!(err.to_string().contains("No table named 'Orders'"), "{}", err);
}

#[test]
fn test_broken_formula_loads_with_error_state() {
    let yaml = r#"
tables:
  - name: Sales
    measures:
      - name: Broken
        expression: SUM(Sales[Missing])
"#;
    let session = load(yaml).unwrap();
    let broken = id_of(&session, "Sales[Broken]");
    assert_eq!(
        session.error_state(broken).unwrap().as_deref(),
        Some("Cannot find column 'Sales'[Missing]")
    );
}
