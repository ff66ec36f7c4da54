//! todosync-core - Core library for todosync
//!
//! Offline-first entry storage plus the sync engine that reconciles it with a
//! remote todo service. Used by the CLI and any other client front end.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Entry, EntryFields, EntryFilter, EntrySort, LocalId, RemoteId};
pub use services::EntryStore;
pub use state::SyncState;
pub use sync::{SyncEngine, SyncReport, SyncService};
