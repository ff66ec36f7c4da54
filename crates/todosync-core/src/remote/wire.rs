//! JSON wire format of the todo list service.
//!
//! Timestamps travel as fractional epoch seconds and are stored as epoch
//! milliseconds. Tombstones may omit everything except `id` and `deleted`.

use serde::Deserialize;

use super::{EntryList, RemoteChange, RemoteEntry, RemoteError, RemoteResult};
use crate::models::RemoteId;
use crate::sync::SyncCursor;
use crate::util::{compact_text, seconds_to_millis};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Int(i64),
}

impl WireFlag {
    const fn is_set(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    complete: Option<WireFlag>,
    #[serde(default)]
    created: Option<f64>,
    #[serde(default)]
    modified: Option<f64>,
    #[serde(default)]
    deleted: Option<WireFlag>,
}

#[derive(Debug, Deserialize)]
struct WireEntryList {
    timestamp: f64,
    #[serde(default)]
    entries: Vec<WireEntry>,
}

impl WireEntry {
    fn is_tombstone(&self) -> bool {
        self.deleted.as_ref().is_some_and(WireFlag::is_set)
    }

    fn into_entry(self) -> RemoteResult<RemoteEntry> {
        let id = self.id;
        let missing =
            |field: &str| RemoteError::Malformed(format!("entry {id} is missing `{field}`"));
        let complete = self.complete.as_ref().ok_or_else(|| missing("complete"))?.is_set();
        let created = self.created.ok_or_else(|| missing("created"))?;
        let modified = self.modified.ok_or_else(|| missing("modified"))?;

        Ok(RemoteEntry {
            id: RemoteId::new(id),
            title: self.title,
            notes: self.notes,
            complete,
            created_at: seconds_to_millis(created),
            modified_at: seconds_to_millis(modified),
        })
    }

    fn into_change(self) -> RemoteResult<RemoteChange> {
        if self.is_tombstone() {
            Ok(RemoteChange::Tombstone(RemoteId::new(self.id)))
        } else {
            self.into_entry().map(RemoteChange::Upsert)
        }
    }
}

fn malformed(error: &serde_json::Error, body: &str) -> RemoteError {
    RemoteError::Malformed(format!("{error}: {}", compact_text(body)))
}

/// Parse a single entry returned by create or update.
pub fn parse_entry(body: &str) -> RemoteResult<RemoteEntry> {
    let wire: WireEntry = serde_json::from_str(body).map_err(|error| malformed(&error, body))?;
    wire.into_entry()
}

/// Parse a listing response.
pub fn parse_entry_list(body: &str) -> RemoteResult<EntryList> {
    let wire: WireEntryList =
        serde_json::from_str(body).map_err(|error| malformed(&error, body))?;
    if !wire.timestamp.is_finite() {
        return Err(RemoteError::Malformed(format!(
            "listing timestamp {} is not a number",
            wire.timestamp
        )));
    }

    let changes = wire
        .entries
        .into_iter()
        .map(WireEntry::into_change)
        .collect::<RemoteResult<Vec<_>>>()?;

    Ok(EntryList {
        timestamp: SyncCursor::new(wire.timestamp),
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_listing_with_tombstones() {
        let body = r#"{
            "timestamp": 1000.0,
            "entries": [
                {"id": 7, "deleted": true},
                {"id": 8, "title": "Buy milk", "notes": null, "complete": 1,
                 "created": 10.5, "modified": 12.25}
            ]
        }"#;

        let list = parse_entry_list(body).unwrap();

        assert_eq!(list.timestamp, SyncCursor::new(1000.0));
        assert_eq!(
            list.changes,
            vec![
                RemoteChange::Tombstone(RemoteId::new(7)),
                RemoteChange::Upsert(RemoteEntry {
                    id: RemoteId::new(8),
                    title: Some("Buy milk".to_string()),
                    notes: None,
                    complete: true,
                    created_at: 10_500,
                    modified_at: 12_250,
                }),
            ]
        );
    }

    #[test]
    fn entry_without_timestamps_is_malformed() {
        let result = parse_entry(r#"{"id": 3, "title": "x", "complete": false}"#);
        assert!(matches!(result, Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let result = parse_entry_list("<html>oops</html>");
        assert!(matches!(result, Err(RemoteError::Malformed(_))));
    }
}
