use std::path::Path;

use todosync_core::EntryFields;

use crate::commands::common::{normalize_content, open_store, resolve_entry_title};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    notes: Option<String>,
    done: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = resolve_entry_title(title_parts)?;

    let mut fields = EntryFields::titled(title).with_complete(done);
    if let Some(notes) = notes.as_deref().and_then(normalize_content) {
        fields = fields.with_notes(notes);
    }

    let store = open_store(db_path).await?;
    let id = store.insert(fields).await?;

    println!("{id}");
    Ok(())
}
