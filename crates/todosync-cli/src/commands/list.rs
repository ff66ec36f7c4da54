use std::path::Path;

use todosync_core::{Entry, EntryFilter, EntrySort};

use crate::commands::common::{
    entry_to_list_item, format_entry_lines, normalize_content, open_store, EntryListItem,
};
use crate::error::CliError;

/// Which entries `list` shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub complete: Option<bool>,
    pub search: Option<String>,
    pub sort: EntrySort,
    pub limit: Option<usize>,
}

impl ListOptions {
    fn filter(&self) -> EntryFilter {
        EntryFilter {
            complete: self.complete,
            title_contains: self.search.as_deref().and_then(normalize_content),
            ..EntryFilter::all()
        }
    }
}

pub async fn list_entries(options: &ListOptions, db_path: &Path) -> Result<Vec<Entry>, CliError> {
    let store = open_store(db_path).await?;
    Ok(store
        .query_limited(&options.filter(), options.sort, options.limit)
        .await?)
}

pub async fn run_list(options: &ListOptions, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let entries = list_entries(options, db_path).await?;

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!("No entries.");
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
