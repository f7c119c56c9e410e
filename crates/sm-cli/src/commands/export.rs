//! Export command implementation

use anyhow::{Context, Result};

use crate::cli::{ExportArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{load_session, print_json};
use crate::model_file::ModelFile;

/// Execute the export command
pub(crate) fn execute(args: &ExportArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let file = ModelFile::from_session(&session);

    match (&args.out, global.output) {
        (Some(path), _) => file.save(path),
        (None, OutputFormat::Json) => print_json(&file),
        (None, OutputFormat::Table) => {
            let yaml = file.to_yaml().context("Failed to serialize model")?;
            print!("{}", yaml);
            Ok(())
        }
    }
}
