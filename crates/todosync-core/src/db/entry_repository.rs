//! Entry repository implementation
//!
//! All statements run against a plain `&Connection`, so the same repository
//! works on a connection or inside a `rusqlite::Transaction` (which derefs to
//! one). Sync phases rely on that to group several calls atomically.

use crate::error::Result;
use crate::models::{Entry, EntryFields, EntryFilter, EntrySort, LocalId, PendingUpdate, RemoteId};
use crate::models::{PendingSummary, DEFAULT_TITLE};
use crate::remote::RemoteEntry;
use crate::util::now_millis;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

const COLUMNS: &str = "local_id, remote_id, title, notes, complete, created_at, modified_at, \
                       pending_update, pending_delete, pending_tx";

const DIRTY: &str = "pending_delete != 0 OR pending_update > 0";

/// How a remote change landed in the local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    Inserted,
    Updated,
    Deleted,
    /// Nothing changed: same modification time, locally dirty, or unknown tombstone.
    Unchanged,
}

/// Trait for entry storage operations
pub trait EntryRepository {
    /// Insert a locally created entry, dirty and without a remote id
    fn insert(&self, fields: &EntryFields) -> Result<LocalId>;

    /// Get a visible entry by local id
    fn get(&self, id: LocalId) -> Result<Option<Entry>>;

    /// List visible entries matching the filter
    fn query(&self, filter: &EntryFilter, sort: EntrySort, limit: Option<usize>)
        -> Result<Vec<Entry>>;

    /// Apply a local edit and mark the matched rows dirty
    fn update(&self, filter: &EntryFilter, fields: &EntryFields) -> Result<usize>;

    /// Mark matched rows as pending deletion
    fn soft_delete(&self, filter: &EntryFilter) -> Result<usize>;

    /// Physically remove a row, whatever its state
    fn hard_delete(&self, id: LocalId) -> Result<bool>;

    /// Every row including those pending deletion, in creation order
    fn all_rows(&self) -> Result<Vec<Entry>>;

    /// Rows with outstanding local changes, in creation order
    fn dirty_rows(&self) -> Result<Vec<Entry>>;

    /// Mark every dirty row as staged and in flight
    fn mark_staged(&self) -> Result<usize>;

    /// Clear the in-flight flag on every row
    fn clear_in_flight(&self) -> Result<usize>;

    /// Record the server's canonical copy of a pushed row and step its pending counter down
    fn confirm_push(&self, id: LocalId, canonical: &RemoteEntry) -> Result<bool>;

    /// Insert a remote entry as a clean row, reusing `local_id` when given.
    /// Returns `false` when the remote id or local id is already taken.
    fn insert_remote(&self, remote: &RemoteEntry, local_id: Option<LocalId>) -> Result<bool>;

    /// Merge a remote entry, leaving locally dirty rows untouched
    fn apply_remote_upsert(&self, remote: &RemoteEntry) -> Result<RemoteApply>;

    /// Remove the row carrying a remotely deleted id, dirty or not
    fn apply_remote_delete(&self, id: RemoteId) -> Result<RemoteApply>;

    /// Put a held row back after the table was rebuilt from a full listing.
    /// Rows whose remote id is missing from the rebuilt table are dropped.
    fn restore_held(&self, held: &Entry) -> Result<()>;

    /// Remove every row
    fn delete_all(&self) -> Result<usize>;

    /// Row counts by sync state
    fn pending_summary(&self) -> Result<PendingSummary>;
}

/// `SQLite` implementation of `EntryRepository`
pub struct SqliteEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry from a database row selected with [`COLUMNS`]
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
        Ok(Entry {
            local_id: LocalId::new(row.get(0)?),
            remote_id: row.get::<_, Option<i64>>(1)?.map(RemoteId::new),
            title: row.get(2)?,
            notes: row.get(3)?,
            complete: row.get::<_, i64>(4)? != 0,
            created_at: row.get(5)?,
            modified_at: row.get(6)?,
            pending_update: PendingUpdate::from_i64(row.get(7)?),
            pending_delete: row.get::<_, i64>(8)? != 0,
            pending_tx: row.get::<_, i64>(9)? != 0,
        })
    }

    fn select(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Put back a held row that was never pushed, keeping its local id.
    fn insert_unpushed(&self, held: &Entry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO entries (local_id, remote_id, title, notes, complete, created_at,
                                  modified_at, pending_tx, pending_update, pending_delete)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                held.local_id.get(),
                held.title,
                held.notes,
                i64::from(held.complete),
                held.created_at,
                held.modified_at,
                i64::from(held.pending_tx),
                held.pending_update.as_i64(),
                i64::from(held.pending_delete),
            ],
        )?;
        Ok(())
    }
}

/// Build the WHERE clause for a filter. Pending deletions are always excluded.
fn filter_clause(filter: &EntryFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["pending_delete = 0"];
    let mut values = Vec::new();

    if let Some(id) = filter.local_id {
        clauses.push("local_id = ?");
        values.push(Value::Integer(id.get()));
    }
    if let Some(id) = filter.remote_id {
        clauses.push("remote_id = ?");
        values.push(Value::Integer(id.get()));
    }
    if let Some(complete) = filter.complete {
        clauses.push("complete = ?");
        values.push(Value::Integer(i64::from(complete)));
    }
    if let Some(needle) = filter.title_contains.as_deref() {
        clauses.push("title LIKE ? ESCAPE '\\'");
        values.push(Value::Text(format!("%{}%", escape_like(needle))));
    }

    (clauses.join(" AND "), values)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn insert(&self, fields: &EntryFields) -> Result<LocalId> {
        let now = now_millis();
        let created_at = fields.created_at.unwrap_or(now);

        self.conn.execute(
            "INSERT INTO entries (title, notes, complete, created_at, modified_at,
                                  pending_update, pending_delete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                fields.title.as_deref().unwrap_or(DEFAULT_TITLE),
                fields.notes.as_deref().unwrap_or_default(),
                i64::from(fields.complete.unwrap_or(false)),
                created_at,
                fields.modified_at.unwrap_or(created_at.max(now)),
                PendingUpdate::Dirty.as_i64(),
            ],
        )?;

        Ok(LocalId::new(self.conn.last_insert_rowid()))
    }

    fn get(&self, id: LocalId) -> Result<Option<Entry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM entries WHERE local_id = ?1 AND pending_delete = 0"),
                params![id.get()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn query(
        &self,
        filter: &EntryFilter,
        sort: EntrySort,
        limit: Option<usize>,
    ) -> Result<Vec<Entry>> {
        let (clause, mut values) = filter_clause(filter);
        let mut sql = format!(
            "SELECT {COLUMNS} FROM entries WHERE {clause} ORDER BY {}",
            sort.order_by()
        );
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }
        self.select(&sql, values)
    }

    fn update(&self, filter: &EntryFilter, fields: &EntryFields) -> Result<usize> {
        let mut assignments = Vec::new();
        let mut values = Vec::new();

        if let Some(title) = &fields.title {
            assignments.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(notes) = &fields.notes {
            assignments.push("notes = ?");
            values.push(Value::Text(notes.clone()));
        }
        if let Some(complete) = fields.complete {
            assignments.push("complete = ?");
            values.push(Value::Integer(i64::from(complete)));
        }
        if let Some(created_at) = fields.created_at {
            assignments.push("created_at = ?");
            values.push(Value::Integer(created_at));
        }
        assignments.push("modified_at = MAX(modified_at, ?)");
        values.push(Value::Integer(now_millis()));
        assignments.push("pending_update = ?");
        values.push(Value::Integer(PendingUpdate::Dirty.as_i64()));

        let (clause, filter_values) = filter_clause(filter);
        values.extend(filter_values);

        let sql = format!(
            "UPDATE entries SET {} WHERE {clause}",
            assignments.join(", ")
        );
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    fn soft_delete(&self, filter: &EntryFilter) -> Result<usize> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("UPDATE entries SET pending_delete = 1 WHERE {clause}");
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    fn hard_delete(&self, id: LocalId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM entries WHERE local_id = ?1", params![id.get()])?;
        Ok(rows > 0)
    }

    fn all_rows(&self) -> Result<Vec<Entry>> {
        self.select(
            &format!("SELECT {COLUMNS} FROM entries ORDER BY created_at ASC, local_id ASC"),
            Vec::new(),
        )
    }

    fn dirty_rows(&self) -> Result<Vec<Entry>> {
        self.select(
            &format!(
                "SELECT {COLUMNS} FROM entries WHERE {DIRTY} ORDER BY created_at ASC, local_id ASC"
            ),
            Vec::new(),
        )
    }

    fn mark_staged(&self) -> Result<usize> {
        let rows = self.conn.execute(
            &format!("UPDATE entries SET pending_update = ?1, pending_tx = 1 WHERE {DIRTY}"),
            params![PendingUpdate::Staged.as_i64()],
        )?;
        Ok(rows)
    }

    fn clear_in_flight(&self) -> Result<usize> {
        let rows = self
            .conn
            .execute("UPDATE entries SET pending_tx = 0 WHERE pending_tx != 0", [])?;
        Ok(rows)
    }

    fn confirm_push(&self, id: LocalId, canonical: &RemoteEntry) -> Result<bool> {
        // Title, notes and completion stay local: an edit made while the
        // request was in flight must survive, and it bumped pending_update to 2.
        let rows = self.conn.execute(
            "UPDATE entries
             SET remote_id = ?1, created_at = ?2, modified_at = ?3,
                 pending_update = MAX(pending_update - 1, 0)
             WHERE local_id = ?4",
            params![
                canonical.id.get(),
                canonical.created_at,
                canonical.modified_at,
                id.get()
            ],
        )?;
        Ok(rows > 0)
    }

    fn insert_remote(&self, remote: &RemoteEntry, local_id: Option<LocalId>) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO entries (local_id, remote_id, title, notes, complete, created_at,
                                  modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT DO NOTHING",
            params![
                local_id.map(LocalId::get),
                remote.id.get(),
                remote.title.as_deref().unwrap_or(DEFAULT_TITLE),
                remote.notes.as_deref().unwrap_or_default(),
                i64::from(remote.complete),
                remote.created_at,
                remote.modified_at,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn apply_remote_upsert(&self, remote: &RemoteEntry) -> Result<RemoteApply> {
        let known: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entries WHERE remote_id = ?1)",
            params![remote.id.get()],
            |row| row.get(0),
        )?;

        if !known {
            return Ok(if self.insert_remote(remote, None)? {
                RemoteApply::Inserted
            } else {
                RemoteApply::Unchanged
            });
        }

        let rows = self.conn.execute(
            "UPDATE entries
             SET title = COALESCE(?1, title), notes = COALESCE(?2, notes), complete = ?3,
                 created_at = ?4, modified_at = ?5
             WHERE remote_id = ?6
               AND pending_update = 0 AND pending_delete = 0
               AND modified_at != ?5",
            params![
                remote.title,
                remote.notes,
                i64::from(remote.complete),
                remote.created_at,
                remote.modified_at,
                remote.id.get(),
            ],
        )?;

        Ok(if rows > 0 {
            RemoteApply::Updated
        } else {
            RemoteApply::Unchanged
        })
    }

    fn apply_remote_delete(&self, id: RemoteId) -> Result<RemoteApply> {
        let rows = self
            .conn
            .execute("DELETE FROM entries WHERE remote_id = ?1", params![id.get()])?;
        Ok(if rows > 0 {
            RemoteApply::Deleted
        } else {
            RemoteApply::Unchanged
        })
    }

    fn restore_held(&self, held: &Entry) -> Result<()> {
        let Some(remote_id) = held.remote_id else {
            // Never pushed: the listing cannot contain it
            return self.insert_unpushed(held);
        };

        let rows = self.conn.execute(
            "UPDATE entries
             SET local_id = ?1, title = ?2, notes = ?3, complete = ?4, created_at = ?5,
                 modified_at = ?6, pending_tx = ?7, pending_update = ?8, pending_delete = ?9
             WHERE remote_id = ?10",
            params![
                held.local_id.get(),
                held.title,
                held.notes,
                i64::from(held.complete),
                held.created_at,
                held.modified_at,
                i64::from(held.pending_tx),
                held.pending_update.as_i64(),
                i64::from(held.pending_delete),
                remote_id.get(),
            ],
        )?;
        if rows > 0 {
            return Ok(());
        }

        // Deleted upstream: the remote deletion wins over the local change
        if held.pending_delete {
            tracing::debug!(
                "Dropping pending delete of entry {}: remote copy is gone",
                held.local_id
            );
        } else {
            tracing::debug!(
                "Dropping local edit of entry {}: remote entry {remote_id} was deleted",
                held.local_id
            );
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM entries", [])?)
    }

    fn pending_summary(&self) -> Result<PendingSummary> {
        let summary = self.conn.query_row(
            "SELECT
                COALESCE(SUM(pending_delete = 0), 0),
                COALESCE(SUM(pending_delete = 0 AND pending_update >= 2), 0),
                COALESCE(SUM(pending_delete = 0 AND pending_update = 1), 0),
                COALESCE(SUM(pending_delete != 0), 0),
                COALESCE(SUM(pending_tx != 0), 0)
             FROM entries",
            [],
            |row| {
                Ok(PendingSummary {
                    visible: count(row.get(0)?),
                    dirty: count(row.get(1)?),
                    staged: count(row.get(2)?),
                    deleting: count(row.get(3)?),
                    in_flight: count(row.get(4)?),
                })
            },
        )?;
        Ok(summary)
    }
}
