use std::path::Path;

use todosync_core::{EntryFields, EntryFilter};

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, open_store, parse_editor_entry,
    render_editor_entry, require_entry,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<String>,
    notes: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let entry = require_entry(&store, id).await?;

    let fields = if title.is_none() && notes.is_none() {
        let initial = render_editor_entry(&entry.title, &entry.notes);
        let Some(edited) = capture_editor_input_with_initial(&initial)? else {
            return Err(CliError::EmptyEditedContent);
        };
        let Some((title, notes)) = parse_editor_entry(&edited) else {
            return Err(CliError::EmptyEditedContent);
        };
        if title == entry.title && notes == entry.notes {
            println!("{}", entry.local_id);
            return Ok(());
        }
        EntryFields::titled(title).with_notes(notes)
    } else {
        let mut fields = EntryFields::default();
        if let Some(title) = title {
            fields.title = Some(normalize_content(&title).ok_or(CliError::EmptyEditedContent)?);
        }
        if let Some(notes) = notes {
            fields.notes = Some(notes.trim().to_string());
        }
        fields
    };

    store
        .update(&EntryFilter::by_id(entry.local_id), &fields)
        .await?;
    println!("{}", entry.local_id);
    Ok(())
}
