//! Task entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Title given to entries inserted without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Process-local identity of an entry row, assigned on insert and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(i64);

impl LocalId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Identity assigned by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(i64);

impl RemoteId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream state of a row's fields.
///
/// Stored as the raw integer so a confirmation can decrement it in SQL while
/// a concurrent local edit bumps it back to [`PendingUpdate::Dirty`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingUpdate {
    /// In agreement with the last known remote state.
    #[default]
    Clean,
    /// Staged by a running push.
    Staged,
    /// Edited locally since the last push.
    Dirty,
}

impl PendingUpdate {
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Clean => 0,
            Self::Staged => 1,
            Self::Dirty => 2,
        }
    }

    pub const fn from_i64(value: i64) -> Self {
        match value {
            i64::MIN..=0 => Self::Clean,
            1 => Self::Staged,
            _ => Self::Dirty,
        }
    }
}

/// A task entry together with its sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub local_id: LocalId,
    pub remote_id: Option<RemoteId>,
    pub title: String,
    pub notes: String,
    pub complete: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last modification timestamp (Unix ms)
    pub modified_at: i64,
    pub pending_update: PendingUpdate,
    /// Deleted locally, waiting for the remote delete to be confirmed
    pub pending_delete: bool,
    /// Part of an in-flight upstream push
    pub pending_tx: bool,
}

impl Entry {
    /// Whether the row carries local changes the remote has not confirmed.
    pub const fn is_dirty(&self) -> bool {
        self.pending_delete || !matches!(self.pending_update, PendingUpdate::Clean)
    }
}

/// Field values for inserts and updates. Unset fields keep their current
/// value on update and take defaults on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFields {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub complete: Option<bool>,
    pub created_at: Option<i64>,
    /// Only honoured on insert; updates always stamp the current time.
    pub modified_at: Option<i64>,
}

impl EntryFields {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub const fn with_complete(mut self, complete: bool) -> Self {
        self.complete = Some(complete);
        self
    }
}

/// Row selection for queries, updates and deletes.
///
/// Rows pending deletion never match, whatever the filter says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub local_id: Option<LocalId>,
    pub remote_id: Option<RemoteId>,
    pub complete: Option<bool>,
    /// Case-insensitive substring match on the title
    pub title_contains: Option<String>,
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: LocalId) -> Self {
        Self {
            local_id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_remote_id(id: RemoteId) -> Self {
        Self {
            remote_id: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_complete(mut self, complete: bool) -> Self {
        self.complete = Some(complete);
        self
    }
}

/// Result ordering for queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySort {
    #[default]
    CreatedAsc,
    CreatedDesc,
    ModifiedDesc,
    TitleAsc,
}

impl EntrySort {
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::CreatedAsc => "created_at ASC, local_id ASC",
            Self::CreatedDesc => "created_at DESC, local_id DESC",
            Self::ModifiedDesc => "modified_at DESC, local_id DESC",
            Self::TitleAsc => "title COLLATE NOCASE ASC, local_id ASC",
        }
    }
}

/// Row counts by sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSummary {
    /// Rows visible to queries
    pub visible: usize,
    /// Visible rows edited since the last push
    pub dirty: usize,
    /// Visible rows staged by a push that has not confirmed them
    pub staged: usize,
    /// Rows waiting for a remote delete
    pub deleting: usize,
    /// Rows inside an in-flight push
    pub in_flight: usize,
}

impl PendingSummary {
    /// Rows that the next push would send upstream.
    pub const fn outstanding(&self) -> usize {
        self.dirty + self.staged + self.deleting
    }
}

/// Change notification published by the entry store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    /// A single entry changed.
    Entry(LocalId),
    /// Any number of entries may have changed.
    Collection,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry {
            local_id: LocalId::new(1),
            remote_id: None,
            title: "Buy milk".to_string(),
            notes: String::new(),
            complete: false,
            created_at: 1,
            modified_at: 1,
            pending_update: PendingUpdate::Clean,
            pending_delete: false,
            pending_tx: false,
        }
    }

    #[test]
    fn pending_update_maps_raw_values() {
        assert_eq!(PendingUpdate::from_i64(0), PendingUpdate::Clean);
        assert_eq!(PendingUpdate::from_i64(1), PendingUpdate::Staged);
        assert_eq!(PendingUpdate::from_i64(2), PendingUpdate::Dirty);
        assert_eq!(PendingUpdate::from_i64(-3), PendingUpdate::Clean);
        assert_eq!(PendingUpdate::Dirty.as_i64(), 2);
    }

    #[test]
    fn dirty_covers_updates_and_deletes() {
        let mut clean = entry();
        assert!(!clean.is_dirty());

        clean.pending_update = PendingUpdate::Staged;
        assert!(clean.is_dirty());

        let mut deleting = entry();
        deleting.pending_delete = true;
        assert!(deleting.is_dirty());
    }

    #[test]
    fn local_id_parses_trimmed_input() {
        assert_eq!(" 42 ".parse::<LocalId>().unwrap(), LocalId::new(42));
        assert!("abc".parse::<LocalId>().is_err());
    }
}
