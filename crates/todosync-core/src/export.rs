//! Entry export helpers shared by clients.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::Entry;

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Serializable entry representation used in JSON exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub id: i64,
    pub remote_id: Option<i64>,
    pub title: String,
    pub notes: String,
    pub complete: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

#[must_use]
pub fn entry_to_export_item(entry: &Entry) -> ExportEntry {
    ExportEntry {
        id: entry.local_id.get(),
        remote_id: entry.remote_id.map(|id| id.get()),
        title: entry.title.clone(),
        notes: entry.notes.clone(),
        complete: entry.complete,
        created_at: entry.created_at,
        modified_at: entry.modified_at,
    }
}

/// Render entries as pretty-printed JSON.
pub fn render_json_export(entries: &[Entry]) -> serde_json::Result<String> {
    let items = entries
        .iter()
        .map(entry_to_export_item)
        .collect::<Vec<ExportEntry>>();
    serde_json::to_string_pretty(&items)
}

/// Render entries as a Markdown checklist; notes become indented lines.
#[must_use]
pub fn render_markdown_export(entries: &[Entry]) -> String {
    let mut output = String::new();

    for entry in entries {
        let mark = if entry.complete { 'x' } else { ' ' };
        let _ = writeln!(output, "- [{mark}] {}", single_line(&entry.title));
        for line in entry.notes.lines().filter(|line| !line.trim().is_empty()) {
            let _ = writeln!(output, "  {}", line.trim_end());
        }
    }

    output
}

/// Render entries based on selected export format.
pub fn render_entries_export(entries: &[Entry], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(entries),
        ExportFormat::Markdown => Ok(render_markdown_export(entries)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("todosync-export-{timestamp_ms}.{}", format.extension())
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocalId, PendingUpdate, RemoteId};

    fn entry(id: i64, title: &str, notes: &str, complete: bool) -> Entry {
        Entry {
            local_id: LocalId::new(id),
            remote_id: (id % 2 == 0).then(|| RemoteId::new(id * 10)),
            title: title.to_string(),
            notes: notes.to_string(),
            complete,
            created_at: 123,
            modified_at: 456,
            pending_update: PendingUpdate::Clean,
            pending_delete: false,
            pending_tx: false,
        }
    }

    #[test]
    fn render_markdown_export_writes_checklist() {
        let rendered = render_markdown_export(&[
            entry(1, "Buy milk", "", false),
            entry(2, "Call\nplumber", "before noon\n\nask about quote", true),
        ]);

        assert_eq!(
            rendered,
            "- [ ] Buy milk\n- [x] Call plumber\n  before noon\n  ask about quote\n"
        );
    }

    #[test]
    fn render_json_export_keeps_ids() {
        let rendered = render_json_export(&[entry(2, "a", "", false)]).unwrap();
        let parsed: Vec<ExportEntry> = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed[0].id, 2);
        assert_eq!(parsed[0].remote_id, Some(20));
        assert_eq!(parsed[0].modified_at, 456);
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "todosync-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "todosync-export-456.md"
        );
    }
}
