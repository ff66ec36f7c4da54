use std::io;

use thiserror::Error;
use todosync_core::auth::AuthError;
use todosync_core::remote::RemoteError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] todosync_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry title provided")]
    EmptyTitle,
    #[error("Edited entry title cannot be empty")]
    EmptyEditedContent,
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Entry ID must be a number: {0}")]
    InvalidEntryId(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `todosync config init --server <address>` or set TODOSYNC_SERVER."
    )]
    SyncNotConfigured,
    #[error("Sync finished with errors: {0}")]
    SyncFailed(String),
}
