//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// sm - inspect and edit semantic models: dependencies, renames and error roll-ups
#[derive(Parser, Debug)]
#[command(name = "sm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the model file
    #[arg(short, long, global = true, env = "SM_MODEL", default_value = "model.yml")]
    pub model: PathBuf,

    /// Session configuration file
    #[arg(short, long, global = true, env = "SM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the objects an object's formulas reference
    Deps(TraverseArgs),

    /// List the objects whose formulas reference an object
    Refs(TraverseArgs),

    /// Rename an object and fix up every formula that references it
    Rename(RenameArgs),

    /// Delete an object that nothing references
    Delete(DeleteArgs),

    /// Report error states and folder roll-ups
    Errors(ErrorsArgs),

    /// Print the model file as the session sees it
    Export(ExportArgs),
}

/// Arguments for the deps and refs commands
#[derive(Args, Debug)]
pub struct TraverseArgs {
    /// Object path: `Table`, `Table[Member]` or a role name
    pub object: String,

    /// Follow edges past the direct neighbors
    #[arg(short, long)]
    pub transitive: bool,

    /// Maximum number of levels to follow (unbounded when absent)
    #[arg(short, long, requires = "transitive")]
    pub depth: Option<usize>,
}

/// Arguments for the rename command
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Object path: `Table`, `Table[Member]` or a role name
    pub object: String,

    /// New name
    pub new_name: String,

    /// Save the edited model back to the model file
    #[arg(short, long)]
    pub write: bool,
}

/// Arguments for the delete command
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Object path: `Table`, `Table[Member]` or a role name
    pub object: String,

    /// Save the edited model back to the model file
    #[arg(short, long)]
    pub write: bool,
}

/// Arguments for the errors command
#[derive(Args, Debug)]
pub struct ErrorsArgs {
    /// Limit the report to one table
    pub table: Option<String>,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
