//! Errors command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use sm_core::{Container, ObjectKind};

use crate::cli::{ErrorsArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{load_session, print_json, ExitCode};
use crate::object_path::label;

/// One error state or roll-up in the report
#[derive(Debug, Serialize)]
struct ErrorEntry {
    kind: String,
    name: String,
    error: String,
}

/// Execute the errors command. Exits with code 1 when anything has an error.
pub(crate) fn execute(args: &ErrorsArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let model = session.model();

    let only_table = match &args.table {
        Some(name) => Some(
            session
                .find_table(name)
                .map(|t| t.id)
                .with_context(|| format!("No table named '{}'", name))?,
        ),
        None => None,
    };

    let mut entries = Vec::new();
    for object in session.objects() {
        if only_table.is_some_and(|t| model.owning_table(object.id) != Some(t)) {
            continue;
        }
        if let Some(error) = session.error_state(object.id)? {
            entries.push(ErrorEntry {
                kind: object.kind().to_string(),
                name: label(model, object.id),
                error,
            });
        }
        if object.kind() == ObjectKind::Table {
            for (container, message) in model.rollups_of(object.id) {
                if let Container::Folder { path, .. } = container {
                    entries.push(ErrorEntry {
                        kind: "Folder".to_string(),
                        name: format!("{} > {}", object.name, path),
                        error: message.to_string(),
                    });
                }
            }
        }
    }

    match global.output {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            for entry in &entries {
                println!("{} {}", entry.kind, entry.name);
                for line in entry.error.lines() {
                    println!("  {}", line);
                }
            }
            if !entries.is_empty() {
                println!();
            }
            println!("{} error(s)", entries.len());
        }
    }

    if entries.is_empty() {
        Ok(())
    } else {
        Err(ExitCode(1).into())
    }
}
