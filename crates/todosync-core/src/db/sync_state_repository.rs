//! Sync state repository: the persisted pull cursor

use crate::error::Result;
use crate::sync::SyncCursor;
use rusqlite::{params, Connection, OptionalExtension};

const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

/// Trait for sync state storage operations
pub trait SyncStateRepository {
    /// Load the pull cursor; a store that never pulled yields [`SyncCursor::INITIAL`]
    fn load_cursor(&self) -> Result<SyncCursor>;

    /// Persist the pull cursor
    fn save_cursor(&self, cursor: SyncCursor) -> Result<()>;
}

/// `SQLite` implementation of `SyncStateRepository`
pub struct SqliteSyncStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SyncStateRepository for SqliteSyncStateRepository<'_> {
    fn load_cursor(&self) -> Result<SyncCursor> {
        let Some(raw) = self.get_value(LAST_SYNC_TIME_KEY)? else {
            return Ok(SyncCursor::INITIAL);
        };

        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(SyncCursor::new(value)),
            _ => {
                tracing::warn!("Ignoring unreadable sync cursor {raw:?}; next pull will be full");
                Ok(SyncCursor::INITIAL)
            }
        }
    }

    fn save_cursor(&self, cursor: SyncCursor) -> Result<()> {
        self.set_value(LAST_SYNC_TIME_KEY, &cursor.get().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_load_default_cursor() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncStateRepository::new(db.connection());

        let cursor = repo.load_cursor().unwrap();
        assert!(cursor.is_initial());
    }

    #[test]
    fn test_save_and_load_cursor() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncStateRepository::new(db.connection());

        repo.save_cursor(SyncCursor::new(1_700_000_123.456_789)).unwrap();

        let loaded = repo.load_cursor().unwrap();
        assert!((loaded.get() - 1_700_000_123.456_789).abs() < f64::EPSILON);
    }

    #[test]
    fn test_corrupt_cursor_falls_back_to_initial() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncStateRepository::new(db.connection());
        repo.set_value(LAST_SYNC_TIME_KEY, "not-a-number").unwrap();

        assert!(repo.load_cursor().unwrap().is_initial());
    }
}
