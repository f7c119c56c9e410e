//! Refs command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, TraverseArgs};
use crate::commands::common::{load_session, print_rows, resolve, ObjectRow};

/// Execute the refs command
pub(crate) fn execute(args: &TraverseArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let id = resolve(&session, &args.object)?;

    let ids = if args.transitive {
        session.all_referencers(id, args.depth.unwrap_or(usize::MAX))
    } else {
        session.referenced_by_set(id).into_iter().collect()
    };

    let rows: Vec<ObjectRow> = ids.iter().map(|r| ObjectRow::new(&session, *r)).collect();
    print_rows(&rows, global.output)
}
