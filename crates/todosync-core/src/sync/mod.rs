//! Reconciliation between the local entry store and the remote service.
//!
//! A cycle stages dirty rows, pushes them one by one, then pulls either the
//! full listing or the changes since the stored cursor. [`SyncService`] adds
//! the retry policy and request coalescing on top of [`SyncEngine`].

mod cursor;
mod engine;
mod report;
mod scheduler;
mod service;

pub use cursor::SyncCursor;
pub use engine::SyncEngine;
pub use report::{SyncPhase, SyncReport};
pub use scheduler::{ChannelScheduler, NoopScheduler, SyncRequest, SyncScheduler};
pub use service::SyncService;
