//! Services shared by every client.

mod entry_store;

pub use entry_store::{BatchOp, BatchResult, EntryStore, PullCounts};
