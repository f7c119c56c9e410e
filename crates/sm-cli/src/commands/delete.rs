//! Delete command implementation

use anyhow::{Context, Result};

use crate::cli::{DeleteArgs, GlobalArgs};
use crate::commands::common::{load_session, resolve, write_back, EditReport};

/// Execute the delete command
pub(crate) fn execute(args: &DeleteArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = load_session(global)?;
    let id = resolve(&session, &args.object)?;

    session
        .delete(id)
        .with_context(|| format!("Failed to delete {}", args.object))?;

    if let Some(report) = EditReport::last_edit(&session) {
        report.print(global.output)?;
    }
    write_back(&session, global, args.write)
}
