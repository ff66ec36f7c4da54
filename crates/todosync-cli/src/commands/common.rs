use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::Serialize;
use todosync_core::sync::NoopScheduler;
use todosync_core::{Entry, EntryStore, LocalId};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: i64,
    pub remote_id: Option<i64>,
    pub title: String,
    pub notes: String,
    pub complete: bool,
    pub created_at: i64,
    pub modified_at: i64,
    pub relative_time: String,
    /// Local changes not yet confirmed by the server
    pub pending: bool,
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entry.local_id.get(),
        remote_id: entry.remote_id.map(|id| id.get()),
        title: entry.title.clone(),
        notes: entry.notes.clone(),
        complete: entry.complete,
        created_at: entry.created_at,
        modified_at: entry.modified_at,
        relative_time: format_relative_time(entry.modified_at, now_ms),
        pending: entry.is_dirty(),
    }
}

pub fn format_entry_lines(entries: &[Entry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let check = if entry.complete { "[x]" } else { "[ ]" };
            let preview = entry_preview(entry, 40);
            let relative_time = format_relative_time(entry.modified_at, now_ms);
            let marker = if entry.is_dirty() { " *" } else { "" };
            format!(
                "{:>5}  {check} {preview:<40}  {relative_time}{marker}",
                entry.local_id.get()
            )
        })
        .collect()
}

pub fn entry_preview(entry: &Entry, max_chars: usize) -> String {
    let collapsed = entry.title.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Title from arguments, then piped stdin, then the editor.
pub fn resolve_entry_title(title_parts: &[String]) -> Result<String, CliError> {
    if let Some(title) = normalize_content(&title_parts.join(" ")) {
        return Ok(title);
    }

    if let Some(title) = read_piped_stdin()? {
        return Ok(title);
    }

    if let Some(title) = capture_editor_input()? {
        return Ok(title);
    }

    Err(CliError::EmptyTitle)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_entry_id(id: &str) -> Result<LocalId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyEntryId);
    }
    trimmed
        .parse::<LocalId>()
        .map_err(|_| CliError::InvalidEntryId(trimmed.to_string()))
}

pub async fn require_entry(store: &EntryStore, id: &str) -> Result<Entry, CliError> {
    let local_id = parse_entry_id(id)?;
    store
        .get(local_id)
        .await?
        .ok_or_else(|| CliError::EntryNotFound(local_id.to_string()))
}

/// Editor buffer for an entry: the title line, a blank line, then the notes.
pub fn render_editor_entry(title: &str, notes: &str) -> String {
    if notes.is_empty() {
        format!("{title}\n")
    } else {
        format!("{title}\n\n{notes}\n")
    }
}

/// Split an edited buffer back into title and notes. `None` when the title is blank.
pub fn parse_editor_entry(content: &str) -> Option<(String, String)> {
    let mut lines = content.lines();
    let title = normalize_content(lines.next()?)?;
    let notes = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Some((title, notes))
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("todosync-entry-{}-{now}.txt", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("TODOSYNC_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("todosync").join("todosync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Open the store for one-shot commands; writes are synced by `sync` or `watch`.
pub async fn open_store(path: &Path) -> Result<EntryStore, CliError> {
    Ok(EntryStore::open_path(path.to_path_buf(), Arc::new(NoopScheduler)).await?)
}
