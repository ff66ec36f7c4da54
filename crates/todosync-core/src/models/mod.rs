//! Data models for todosync

mod entry;

pub use entry::{
    Entry, EntryChange, EntryFields, EntryFilter, EntrySort, LocalId, PendingSummary, PendingUpdate,
    RemoteId, DEFAULT_TITLE,
};
