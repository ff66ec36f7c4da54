//! Database layer for todosync

mod connection;
mod entry_repository;
mod migrations;
mod sync_state_repository;

pub use connection::Database;
pub use entry_repository::{EntryRepository, RemoteApply, SqliteEntryRepository};
pub use sync_state_repository::{SqliteSyncStateRepository, SyncStateRepository};
