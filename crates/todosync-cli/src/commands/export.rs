use std::path::Path;

use todosync_core::export::render_entries_export;
use todosync_core::{EntryFilter, EntrySort};

use crate::cli::ExportFormat;
use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let entries = store
        .query(&EntryFilter::all(), EntrySort::CreatedAsc)
        .await?;
    let rendered = render_entries_export(&entries, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}
