//! Remote entry service: wire types, failure classification and the client seam.

mod http;
mod wire;

pub use http::{HttpEntryClient, DEFAULT_REQUEST_TIMEOUT};

use thiserror::Error;

use crate::auth::Credential;
use crate::models::{Entry, RemoteId};
use crate::sync::SyncCursor;

/// Canonical copy of an entry as the remote service reports it.
///
/// `title` and `notes` are `None` when the service sent `null`; merges keep
/// the local value in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: RemoteId,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub complete: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last modification timestamp (Unix ms)
    pub modified_at: i64,
}

/// One element of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    Upsert(RemoteEntry),
    /// The entry was deleted remotely.
    Tombstone(RemoteId),
}

/// Result of a list call: the changes plus the cursor to resume from.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryList {
    pub timestamp: SyncCursor,
    pub changes: Vec<RemoteChange>,
}

/// Fields sent upstream on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPayload {
    pub title: String,
    pub notes: String,
    pub complete: bool,
}

impl From<&Entry> for EntryPayload {
    fn from(entry: &Entry) -> Self {
        Self {
            title: entry.title.clone(),
            notes: entry.notes.clone(),
            complete: entry.complete,
        }
    }
}

/// How the service acknowledged a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// HTTP 201
    Created,
    /// HTTP 200
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub status: WriteStatus,
    pub entry: RemoteEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The service no longer knows the entry (HTTP 410).
    Gone,
}

/// Failure category used for sync bookkeeping and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport problem or timeout; retried after a delay.
    Network,
    /// Malformed payload or server-side fault; not retried automatically.
    Server,
    /// The request itself was wrong or refused.
    Request,
    /// Credentials missing, expired or rejected.
    Auth,
}

/// Errors returned by remote entry operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Authentication failed: {message}")]
    Auth {
        invalid_credentials: bool,
        message: String,
    },
    #[error("Invalid request: {0}")]
    Request(String),
}

impl RemoteError {
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Network,
            Self::Malformed(_) | Self::Server { .. } => FailureKind::Server,
            Self::Rejected { .. } | Self::Request(_) => FailureKind::Request,
            Self::Auth { .. } => FailureKind::Auth,
        }
    }

    /// The service refused an incremental listing; only a full pull can recover.
    pub const fn is_stale_window(&self) -> bool {
        matches!(self, Self::Rejected { status: 400, .. })
    }

    pub const fn is_invalid_credentials(&self) -> bool {
        matches!(
            self,
            Self::Auth {
                invalid_credentials: true,
                ..
            }
        )
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Operations against the remote entry collection.
#[allow(async_fn_in_trait)]
pub trait RemoteEntries {
    /// Install the credential used by subsequent calls.
    fn set_credential(&self, credential: Option<Credential>);

    async fn create(&self, payload: &EntryPayload) -> RemoteResult<WriteOutcome>;

    async fn update(&self, id: RemoteId, payload: &EntryPayload) -> RemoteResult<WriteOutcome>;

    async fn delete(&self, id: RemoteId) -> RemoteResult<DeleteOutcome>;

    /// Full collection when `since` is `None`, otherwise entries modified after it
    /// (tombstones included).
    async fn list(&self, since: Option<SyncCursor>) -> RemoteResult<EntryList>;
}
