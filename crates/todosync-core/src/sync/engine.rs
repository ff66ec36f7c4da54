//! The sync cycle: stage, push, then pull.

use std::ops::ControlFlow;

use tracing::Instrument;

use super::report::{SyncPhase, SyncReport};
use super::SyncCursor;
use crate::auth::{AccountRef, CredentialResolver, NoCredentials};
use crate::models::Entry;
use crate::remote::{
    DeleteOutcome, EntryPayload, FailureKind, RemoteEntries, RemoteError, WriteStatus,
};
use crate::services::EntryStore;

/// Why pushing a single row stopped.
enum PushFailure {
    Remote(RemoteError),
    Store(crate::Error),
}

impl From<RemoteError> for PushFailure {
    fn from(error: RemoteError) -> Self {
        Self::Remote(error)
    }
}

impl From<crate::Error> for PushFailure {
    fn from(error: crate::Error) -> Self {
        Self::Store(error)
    }
}

/// Reconciles an [`EntryStore`] with a remote entry service.
///
/// Cycles on the same store never overlap: [`SyncEngine::run`] waits for any
/// running cycle to finish first.
pub struct SyncEngine<R, A = NoCredentials> {
    store: EntryStore,
    remote: R,
    credentials: A,
}

impl<R: RemoteEntries> SyncEngine<R, NoCredentials> {
    pub const fn new(store: EntryStore, remote: R) -> Self {
        Self {
            store,
            remote,
            credentials: NoCredentials,
        }
    }
}

impl<R: RemoteEntries, A: CredentialResolver> SyncEngine<R, A> {
    /// Use `credentials` to authenticate cycles that name an account.
    pub fn with_credentials<B: CredentialResolver>(self, credentials: B) -> SyncEngine<R, B> {
        SyncEngine {
            store: self.store,
            remote: self.remote,
            credentials,
        }
    }

    pub const fn store(&self) -> &EntryStore {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Run one cycle. Failures are counted in the report, never returned.
    ///
    /// With `full_sync_requested` the local table is wiped (pending local
    /// changes included) and rebuilt from the full remote listing.
    pub async fn run(&self, account: Option<&AccountRef>, full_sync_requested: bool) -> SyncReport {
        let _cycle = self.store.begin_cycle().await;
        let span = tracing::info_span!("sync_cycle", full_sync = full_sync_requested);
        self.run_cycle(account, full_sync_requested)
            .instrument(span)
            .await
    }

    async fn run_cycle(&self, account: Option<&AccountRef>, full_sync_requested: bool) -> SyncReport {
        let mut report = SyncReport::default();

        if let Some(account) = account {
            self.resolve_credentials(account, &mut report).await;
        }
        report.advance(SyncPhase::AuthResolved);

        if full_sync_requested {
            match self.store.clear_all().await {
                Ok(removed) => tracing::info!("Cleared {removed} local entries for full sync"),
                Err(error) => report.record_store_error(&error),
            }
        } else {
            self.push(&mut report).await;
        }
        report.advance(SyncPhase::Pushed);

        if !report.can_pull() {
            tracing::warn!("Skipping pull after failed push: {}", report.summary());
            return report;
        }

        match self.store.last_sync_time().await {
            Ok(cursor) if cursor.is_initial() => self.full_pull(&mut report).await,
            Ok(cursor) => self.incremental_pull(cursor, &mut report).await,
            Err(error) => report.record_store_error(&error),
        }
        report.advance(SyncPhase::Pulled);
        report.advance(SyncPhase::Done);

        tracing::info!("Sync finished: {}", report.summary());
        report
    }

    async fn resolve_credentials(&self, account: &AccountRef, report: &mut SyncReport) {
        match self.credentials.resolve(account).await {
            Ok(credential) => self.remote.set_credential(Some(credential)),
            Err(error) => {
                // The cycle carries on; the remote decides whether it needs the credential
                tracing::warn!("Could not authenticate {account}: {error}");
                report.record_auth_error(&error);
            }
        }
    }

    async fn push(&self, report: &mut SyncReport) {
        let staged = match self.store.stage_dirty().await {
            Ok(staged) => staged,
            Err(error) => {
                report.record_store_error(&error);
                return;
            }
        };
        if !staged.is_empty() {
            tracing::debug!("Pushing {} staged entries", staged.len());
        }

        for (index, entry) in staged.iter().enumerate() {
            if self.push_entry(entry, report).await.is_break() {
                tracing::warn!(
                    "Stopped push with {} entries left staged",
                    staged.len() - index - 1
                );
                break;
            }
        }

        if let Err(error) = self.store.finish_push().await {
            report.record_store_error(&error);
        }
    }

    async fn push_entry(&self, entry: &Entry, report: &mut SyncReport) -> ControlFlow<()> {
        let result = if entry.pending_delete {
            self.push_delete(entry, report).await
        } else {
            self.push_write(entry, report).await
        };

        match result {
            Ok(()) => ControlFlow::Continue(()),
            Err(PushFailure::Remote(error)) => {
                tracing::warn!("Could not push entry {}: {error}", entry.local_id);
                report.record_remote_error(&error);
                if error.kind() == FailureKind::Network {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
            Err(PushFailure::Store(error)) => {
                report.record_store_error(&error);
                ControlFlow::Break(())
            }
        }
    }

    async fn push_delete(&self, entry: &Entry, report: &mut SyncReport) -> Result<(), PushFailure> {
        let Some(remote_id) = entry.remote_id else {
            self.store.hard_delete(entry.local_id).await?;
            tracing::debug!("Dropped entry {} that never reached the server", entry.local_id);
            return Ok(());
        };

        if self.remote.delete(remote_id).await? == DeleteOutcome::Gone {
            tracing::debug!("Entry {remote_id} was already gone remotely");
        }
        self.store.hard_delete(entry.local_id).await?;
        report.num_upstream_deletes += 1;
        Ok(())
    }

    async fn push_write(&self, entry: &Entry, report: &mut SyncReport) -> Result<(), PushFailure> {
        let payload = EntryPayload::from(entry);
        let outcome = match entry.remote_id {
            None => self.remote.create(&payload).await?,
            Some(remote_id) => self.remote.update(remote_id, &payload).await?,
        };

        match outcome.status {
            WriteStatus::Created => report.num_upstream_inserts += 1,
            WriteStatus::Updated => report.num_upstream_updates += 1,
        }
        self.store
            .confirm_push(entry.local_id, &outcome.entry)
            .await?;
        Ok(())
    }

    async fn incremental_pull(&self, cursor: SyncCursor, report: &mut SyncReport) {
        let list = match self.remote.list(Some(cursor)).await {
            Ok(list) => list,
            Err(error) if error.is_stale_window() => {
                tracing::info!("Server refused changes since {cursor}; full sync required");
                report.full_sync_requested = true;
                return;
            }
            Err(error) => {
                tracing::warn!("Incremental pull failed: {error}");
                report.record_remote_error(&error);
                return;
            }
        };

        match self.store.apply_incremental(&list).await {
            Ok(counts) => report.record_pull(counts),
            Err(error) => report.record_store_error(&error),
        }
    }

    async fn full_pull(&self, report: &mut SyncReport) {
        let list = match self.remote.list(None).await {
            Ok(list) => list,
            Err(error) => {
                tracing::warn!("Full pull failed: {error}");
                report.record_remote_error(&error);
                return;
            }
        };

        match self.store.apply_full(&list).await {
            Ok(counts) => report.record_pull(counts),
            Err(error) => report.record_store_error(&error),
        }
    }
}
