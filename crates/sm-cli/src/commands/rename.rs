//! Rename command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, RenameArgs};
use crate::commands::common::{load_session, resolve, write_back, EditReport};

/// Execute the rename command
pub(crate) fn execute(args: &RenameArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = load_session(global)?;
    let id = resolve(&session, &args.object)?;

    session
        .rename(id, &args.new_name)
        .with_context(|| format!("Failed to rename {}", args.object))?;

    match EditReport::last_edit(&session) {
        Some(report) => report.print(global.output)?,
        None => println!("Nothing to rename: {} is already named '{}'", args.object, args.new_name),
    }
    write_back(&session, global, args.write)
}
