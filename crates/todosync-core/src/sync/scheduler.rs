//! Sync scheduling collaborators.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receives requests to run sync cycles.
///
/// Implementations decide when the cycle actually runs; none of these calls block.
pub trait SyncScheduler: Send + Sync {
    /// Run an incremental cycle as soon as possible.
    fn request_immediate_sync(&self);

    /// Run an incremental cycle shortly, coalescing bursts of local writes.
    fn request_lazy_sync(&self);

    /// Run a cycle that rebuilds the store from the full remote listing.
    fn request_full_sync(&self);

    /// Run an incremental cycle after `delay`, replacing any pending delayed run.
    fn schedule_sync(&self, delay: Duration);
}

/// Scheduler that ignores every request; for one-shot tools and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl SyncScheduler for NoopScheduler {
    fn request_immediate_sync(&self) {}

    fn request_lazy_sync(&self) {}

    fn request_full_sync(&self) {}

    fn schedule_sync(&self, _delay: Duration) {}
}

/// Kind of cycle a worker should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    Incremental,
    Full,
}

impl SyncRequest {
    pub const fn is_full(self) -> bool {
        matches!(self, Self::Full)
    }

    /// Combine two queued requests; a full request wins.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        if self.is_full() || other.is_full() {
            Self::Full
        } else {
            Self::Incremental
        }
    }
}

/// Scheduler that feeds a worker through an unbounded channel.
///
/// Delayed requests run on a tokio timer; at most one is pending at a time and
/// a new one replaces it.
pub struct ChannelScheduler {
    sender: mpsc::UnboundedSender<SyncRequest>,
    lazy_interval: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChannelScheduler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChannelScheduler")
            .field("lazy_interval", &self.lazy_interval)
            .finish_non_exhaustive()
    }
}

impl ChannelScheduler {
    pub fn new(lazy_interval: Duration) -> (Self, mpsc::UnboundedReceiver<SyncRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            sender,
            lazy_interval,
            pending: Mutex::new(None),
        };
        (scheduler, receiver)
    }

    /// Drop the pending delayed request, if any.
    pub fn cancel_pending(&self) {
        if let Some(task) = self.replace_pending(None) {
            task.abort();
        }
    }

    fn send(&self, request: SyncRequest) {
        if self.sender.send(request).is_err() {
            tracing::debug!("Sync worker has stopped; dropping {request:?} request");
        }
    }

    fn replace_pending(&self, task: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *pending, task)
    }
}

impl SyncScheduler for ChannelScheduler {
    fn request_immediate_sync(&self) {
        self.send(SyncRequest::Incremental);
    }

    fn request_lazy_sync(&self) {
        self.schedule_sync(self.lazy_interval);
    }

    fn request_full_sync(&self) {
        self.send(SyncRequest::Full);
    }

    fn schedule_sync(&self, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime for a delayed sync; requesting it immediately");
            self.send(SyncRequest::Incremental);
            return;
        };

        let sender = self.sender.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            sender.send(SyncRequest::Incremental).ok();
        });
        if let Some(previous) = self.replace_pending(Some(task)) {
            previous.abort();
        }
        tracing::debug!("Sync scheduled in {delay:?}");
    }
}

impl Drop for ChannelScheduler {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
