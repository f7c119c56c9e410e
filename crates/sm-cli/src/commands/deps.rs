//! Deps command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, TraverseArgs};
use crate::commands::common::{load_session, print_rows, resolve, ObjectRow};
use crate::object_path::label;

/// Execute the deps command
pub(crate) fn execute(args: &TraverseArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let id = resolve(&session, &args.object)?;

    let ids = if args.transitive {
        session.all_dependencies(id, args.depth.unwrap_or(usize::MAX))
    } else {
        session.depends_on_set(id).into_iter().collect()
    };

    if let Some(cycle) = session.circular_path(id) {
        let names: Vec<String> = cycle.iter().map(|c| label(session.model(), *c)).collect();
        eprintln!("warning: circular dependency: {}", names.join(" -> "));
    }

    let rows: Vec<ObjectRow> = ids.iter().map(|d| ObjectRow::new(&session, *d)).collect();
    print_rows(&rows, global.output)
}
