use super::*;
use crate::object::{ModelObject, ObjectData};
use crate::object_name::ObjectName;

const SEPS: &[char] = &['/', '\\'];

fn add_measure(model: &mut Model, table: ObjectId, name: &str, folder: &str) -> ObjectId {
    let id = model.allocate_id();
    model.insert(ModelObject::new(
        id,
        ObjectName::new(name),
        ObjectData::Measure {
            table,
            display_folder: folder.to_string(),
        },
    ));
    id
}

fn add_table(model: &mut Model, name: &str) -> ObjectId {
    let id = model.allocate_id();
    model.insert(ModelObject::new(id, ObjectName::new(name), ObjectData::Table));
    id
}

#[test]
fn test_parse_normalizes_separators() {
    let path = FolderPath::parse(" Finance \\ Tax/ ", SEPS).unwrap();
    assert_eq!(path.as_str(), "Finance/Tax");
    assert_eq!(path.depth(), 2);
    assert_eq!(path.leaf(), "Tax");
}

#[test]
fn test_parse_root() {
    assert!(FolderPath::parse("", SEPS).is_none());
    assert!(FolderPath::parse(" / \\ ", SEPS).is_none());
}

#[test]
fn test_parse_list() {
    let paths = FolderPath::parse_list("Finance/Tax; KPIs ;Finance\\Tax;;", SEPS);
    let names: Vec<&str> = paths.iter().map(FolderPath::as_str).collect();
    assert_eq!(names, vec!["Finance/Tax", "KPIs"]);
}

#[test]
fn test_ancestors_and_parent() {
    let path = FolderPath::parse("A/B/C", SEPS).unwrap();
    let chain: Vec<String> = path.ancestors_and_self().iter().map(|p| p.to_string()).collect();
    assert_eq!(chain, vec!["A", "A/B", "A/B/C"]);
    assert_eq!(path.parent().unwrap().as_str(), "A/B");
    assert!(FolderPath::parse("A", SEPS).unwrap().parent().is_none());
}

#[test]
fn test_build_tree() {
    let mut model = Model::new();
    let sales = add_table(&mut model, "Sales");
    let tax = add_measure(&mut model, sales, "Tax", "Finance/Tax");
    let rev = add_measure(&mut model, sales, "Revenue", "Finance");
    let plain = add_measure(&mut model, sales, "Count", "");
    let multi = add_measure(&mut model, sales, "Margin", "Finance;KPIs");

    let tree = TableFolders::build(&model, sales, SEPS);
    assert_eq!(tree.root_members, vec![plain]);
    assert_eq!(tree.len(), 3);

    let top: Vec<&str> = tree.top_level.iter().map(FolderPath::as_str).collect();
    assert_eq!(top, vec!["Finance", "KPIs"]);

    let finance = tree.folder(&FolderPath::parse("Finance", SEPS).unwrap()).unwrap();
    assert_eq!(finance.members, vec![rev, multi]);
    assert!(finance
        .subfolders
        .contains(&FolderPath::parse("Finance/Tax", SEPS).unwrap()));

    let finance_tax = tree.folder(&FolderPath::parse("Finance/Tax", SEPS).unwrap()).unwrap();
    assert_eq!(finance_tax.members, vec![tax]);
    assert_eq!(tree.placements(multi).len(), 2);
    assert!(tree.placements(plain).is_empty());
}

#[test]
fn test_cache_is_lazy_and_invalidated() {
    let mut model = Model::new();
    let sales = add_table(&mut model, "Sales");
    add_measure(&mut model, sales, "Tax", "Finance");

    let mut cache = FolderCache::new(SEPS.to_vec());
    assert!(!cache.is_cached(sales));
    assert_eq!(cache.build_count(), 0);

    assert_eq!(cache.get(&model, sales).len(), 1);
    assert_eq!(cache.get(&model, sales).len(), 1);
    assert_eq!(cache.build_count(), 1);

    add_measure(&mut model, sales, "Other", "Ops");
    // Stale until invalidated
    assert_eq!(cache.get(&model, sales).len(), 1);

    cache.invalidate(sales);
    assert_eq!(cache.get(&model, sales).len(), 2);
    assert_eq!(cache.build_count(), 2);
}
