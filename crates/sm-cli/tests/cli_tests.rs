//! End-to-end tests of the `sm` binary against model files on disk

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const MODEL: &str = r#"
tables:
  - name: Sales
    columns:
      - name: Amount
      - name: CustomerId
    measures:
      - name: Total
        expression: SUM(Sales[Amount])
      - name: Double
        expression: "[Total] * 2"
        display_folder: Finance/Tax
  - name: Customer
    columns:
      - name: Id
relationships:
  - from: Sales[CustomerId]
    to: Customer[Id]
"#;

fn sm_bin() -> String {
    env!("CARGO_BIN_EXE_sm").to_string()
}

fn write_model(yaml: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.yml");
    fs::write(&path, yaml).unwrap();
    (dir, path)
}

/// Run `sm --model <model> <args>`; returns (stdout, stderr, exit code)
fn run_sm(model: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(sm_bin())
        .arg("--model")
        .arg(model)
        .args(args)
        .env_remove("SM_MODEL")
        .env_remove("SM_CONFIG")
        .output()
        .expect("Failed to run sm");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code(),
    )
}

// ── Queries ─────────────────────────────────────────────────────────────

#[test]
fn test_deps_lists_direct_dependencies() {
    let (_dir, model) = write_model(MODEL);
    let (stdout, stderr, code) = run_sm(&model, &["deps", "Sales[Double]", "-o", "json"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Sales[Total]"]);
}

#[test]
fn test_refs_transitive() {
    let (_dir, model) = write_model(MODEL);
    let (stdout, stderr, code) = run_sm(&model, &["refs", "Sales[Amount]", "--transitive", "-o", "json"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Sales[Total]", "Sales[Double]"]);

    let (stdout, _, _) = run_sm(&model, &["refs", "Sales[Amount]", "-t", "--depth", "1"]);
    assert!(stdout.contains("Sales[Total]"));
    assert!(!stdout.contains("Sales[Double]"));
    assert!(stdout.contains("1 object(s)"));
}

#[test]
fn test_unknown_object_fails() {
    let (_dir, model) = write_model(MODEL);
    let (_, stderr, code) = run_sm(&model, &["deps", "Sales[Nope]"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("Table 'Sales' has no member named 'Nope'"), "{}", stderr);
}

#[test]
fn test_missing_model_file() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_sm(&dir.path().join("absent.yml"), &["export"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("Failed to read model file"), "{}", stderr);
}

// ── Edits ───────────────────────────────────────────────────────────────

#[test]
fn test_rename_reports_fixups_and_writes_back() {
    let (_dir, model) = write_model(MODEL);
    let (stdout, stderr, code) = run_sm(&model, &["rename", "Sales[Amount]", "Revenue", "--write"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(stdout.contains("Rename Column 'Amount' to 'Revenue'"), "{}", stdout);
    assert!(
        stdout.contains("Sales[Total]: SUM(Sales[Amount]) -> SUM(Sales[Revenue])"),
        "{}",
        stdout
    );

    let saved = fs::read_to_string(&model).unwrap();
    assert!(saved.contains("SUM(Sales[Revenue])"), "{}", saved);
    assert!(!saved.contains("Amount"), "{}", saved);
}

#[test]
fn test_rename_without_write_leaves_file_alone() {
    let (_dir, model) = write_model(MODEL);
    let (_, stderr, code) = run_sm(&model, &["rename", "Sales", "Orders"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert_eq!(fs::read_to_string(&model).unwrap(), MODEL);
}

#[test]
fn test_delete_referenced_object_is_refused() {
    let (_dir, model) = write_model(MODEL);
    let (_, stderr, code) = run_sm(&model, &["delete", "Sales[Total]", "--write"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("[SM008]"), "{}", stderr);
    assert!(stderr.contains("Measure 'Double'"), "{}", stderr);
    assert_eq!(fs::read_to_string(&model).unwrap(), MODEL);
}

#[test]
fn test_delete_in_dependency_order() {
    let (_dir, model) = write_model(MODEL);
    let (_, stderr, code) = run_sm(&model, &["delete", "Sales[Double]", "--write"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let (_, stderr, code) = run_sm(&model, &["delete", "Sales[Total]", "--write"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let saved = fs::read_to_string(&model).unwrap();
    assert!(!saved.contains("measures"), "{}", saved);
}

// ── Error report ────────────────────────────────────────────────────────

#[test]
fn test_errors_clean_model_exits_zero() {
    let (_dir, model) = write_model(MODEL);
    let (stdout, _, code) = run_sm(&model, &["errors"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("0 error(s)"));
}

#[test]
fn test_errors_report_folder_rollups() {
    let broken = MODEL.replace("[Total] * 2", "[Missing] * 2");
    let (_dir, model) = write_model(&broken);
    let (stdout, _, code) = run_sm(&model, &["errors", "Sales", "-o", "json"]);
    assert_eq!(code, Some(1));

    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entries = entries.as_array().unwrap();
    let find = |name: &str| {
        entries
            .iter()
            .find(|e| e["name"] == name)
            .unwrap_or_else(|| panic!("no entry for {}: {}", name, stdout))["error"]
            .as_str()
            .unwrap()
            .to_string()
    };

    assert_eq!(find("Sales[Double]"), "Cannot find column or measure '[Missing]'");
    assert_eq!(
        find("Sales > Finance/Tax"),
        "Folder 'Finance/Tax' contains objects with errors:\nMeasure 'Double': Cannot find column or measure '[Missing]'"
    );
    assert_eq!(
        find("Sales > Finance"),
        "Folder 'Finance' contains objects with errors:\nMeasure 'Double': Cannot find column or measure '[Missing]'"
    );
    assert!(find("Sales").starts_with("Table 'Sales' contains objects with errors:"));
}

// ── Export and configuration ────────────────────────────────────────────

#[test]
fn test_export_to_file_round_trips() {
    let (dir, model) = write_model(MODEL);
    let out = dir.path().join("exported.yml");
    let (_, stderr, code) = run_sm(&model, &["export", "--out", out.to_str().unwrap()]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let (first, _, _) = run_sm(&model, &["export"]);
    let (second, _, _) = run_sm(&out, &["export"]);
    assert_eq!(first, second);
    assert!(first.contains("Sales[CustomerId]"), "{}", first);
}

#[test]
fn test_config_disables_fixup() {
    let (dir, model) = write_model(MODEL);
    let config = dir.path().join("semantic-model.yml");
    fs::write(&config, "formula_fixup: false\n").unwrap();

    let (stdout, stderr, code) = run_sm(
        &model,
        &["--config", config.to_str().unwrap(), "rename", "Sales[Amount]", "Revenue"],
    );
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(!stdout.contains("->"), "{}", stdout);
    assert!(stdout.contains("Sales[Total]: Cannot find column 'Sales'[Amount]"), "{}", stdout);
}

#[test]
fn test_invalid_config_is_reported() {
    let (dir, model) = write_model(MODEL);
    let config = dir.path().join("semantic-model.yml");
    fs::write(&config, "formula_fixups: false\n").unwrap();

    let (_, stderr, code) = run_sm(&model, &["--config", config.to_str().unwrap(), "errors"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("[SM002]"), "{}", stderr);
}
