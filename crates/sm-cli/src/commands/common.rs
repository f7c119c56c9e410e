//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use serde::Serialize;
use sm_core::{Change, ModelSession, ObjectId, SessionConfig};
use sm_dax::DaxAnalyzer;
use std::fmt;

use crate::cli::{GlobalArgs, OutputFormat};
use crate::model_file::ModelFile;
use crate::object_path::{label, ObjectPath};

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that destructors run before the process ends.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) u8);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main never prints it
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Load the model file named by the global arguments into a fresh session.
///
/// The load itself is not part of the undo history.
pub(crate) fn load_session(global: &GlobalArgs) -> Result<ModelSession> {
    let config = match &global.config {
        Some(path) => SessionConfig::load(path).context("Failed to load session config")?,
        None => SessionConfig::default(),
    };
    let file = ModelFile::load(&global.model)?;

    let mut session = ModelSession::with_config(DaxAnalyzer, config);
    file.build(&mut session).context("Failed to load model")?;
    session.clear_history();

    if global.verbose {
        eprintln!(
            "[verbose] Loaded {} object(s) from {}",
            session.objects().count(),
            global.model.display()
        );
    }
    Ok(session)
}

pub(crate) fn resolve(session: &ModelSession, raw: &str) -> Result<ObjectId> {
    ObjectPath::parse(raw)?.resolve(session)
}

/// One object in command output
#[derive(Debug, Serialize)]
pub(crate) struct ObjectRow {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ObjectRow {
    pub(crate) fn new(session: &ModelSession, id: ObjectId) -> Self {
        let model = session.model();
        let error = session.error_state(id).unwrap_or_else(|e| {
            log::warn!("Could not read error state of {}: {}", id, e);
            None
        });
        Self {
            kind: model
                .try_get(id)
                .map(|o| o.kind().to_string())
                .unwrap_or_default(),
            name: label(model, id),
            error,
        }
    }
}

pub(crate) fn print_rows(rows: &[ObjectRow], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Table => {
            print_table(rows);
            Ok(())
        }
        OutputFormat::Json => print_json(rows),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn print_table(rows: &[ObjectRow]) {
    let kind_width = rows.iter().map(|r| r.kind.len()).max().unwrap_or(4).max(4);
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);

    println!(
        "{:<kind_width$}  {:<name_width$}  ERROR",
        "KIND",
        "NAME",
        kind_width = kind_width,
        name_width = name_width
    );
    println!(
        "{:-<kind_width$}  {:-<name_width$}  {}",
        "",
        "",
        "-".repeat(20),
        kind_width = kind_width,
        name_width = name_width
    );
    for row in rows {
        let error = row
            .error
            .as_deref()
            .and_then(|e| e.lines().next())
            .unwrap_or("-");
        println!(
            "{:<kind_width$}  {:<name_width$}  {}",
            row.kind,
            row.name,
            error,
            kind_width = kind_width,
            name_width = name_width
        );
    }
    println!();
    println!("{} object(s)", rows.len());
}

/// What the last edit of a session changed
#[derive(Debug, Serialize)]
pub(crate) struct EditReport {
    pub action: String,
    /// Formulas rewritten by the edit
    pub rewritten: Vec<Rewrite>,
    /// Objects whose own error state changed
    pub errors: Vec<ObjectRow>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Rewrite {
    pub object: String,
    pub old: String,
    pub new: String,
}

impl EditReport {
    /// Report on the most recent undo entry of `session`
    pub(crate) fn last_edit(session: &ModelSession) -> Option<Self> {
        let action = session.history().peek_undo()?;
        let model = session.model();
        let mut rewritten = Vec::new();
        let mut errored: Vec<ObjectId> = Vec::new();

        for change in action.changes() {
            match change {
                Change::Expression {
                    id,
                    old: Some(old),
                    new: Some(new),
                    ..
                } => rewritten.push(Rewrite {
                    object: label(model, *id),
                    old: old.clone(),
                    new: new.clone(),
                }),
                Change::Error { id, .. } if model.contains(*id) && !errored.contains(id) => {
                    errored.push(*id);
                }
                _ => {}
            }
        }

        Some(Self {
            action: action.label(),
            rewritten,
            errors: errored.into_iter().map(|id| ObjectRow::new(session, id)).collect(),
        })
    }

    pub(crate) fn print(&self, output: OutputFormat) -> Result<()> {
        if output == OutputFormat::Json {
            return print_json(self);
        }
        println!("{}", self.action);
        for rewrite in &self.rewritten {
            println!("  {}: {} -> {}", rewrite.object, rewrite.old, rewrite.new);
        }
        for row in &self.errors {
            match &row.error {
                Some(error) => println!("  {}: {}", row.name, error.replace('\n', "; ")),
                None => println!("  {}: error cleared", row.name),
            }
        }
        Ok(())
    }
}

/// Save the session back to the model file when `write` is set
pub(crate) fn write_back(session: &ModelSession, global: &GlobalArgs, write: bool) -> Result<()> {
    if !write {
        return Ok(());
    }
    let file = ModelFile::from_session(session);
    log::debug!("Saving {} table(s) to {}", file.tables.len(), global.model.display());
    file.save(&global.model)?;
    if global.verbose {
        eprintln!("[verbose] Wrote {}", global.model.display());
    }
    Ok(())
}
