//! Background driver around the sync engine: retry policy and request coalescing.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{SyncEngine, SyncReport, SyncRequest, SyncScheduler};
use crate::auth::{AccountRef, CredentialResolver, NoCredentials};
use crate::config::SyncSettings;
use crate::remote::RemoteEntries;
use crate::state::SyncState;

/// Runs sync cycles on request and schedules the next one from the outcome.
pub struct SyncService<R, A = NoCredentials> {
    engine: SyncEngine<R, A>,
    settings: SyncSettings,
    account: Option<AccountRef>,
    scheduler: Arc<dyn SyncScheduler>,
    state: watch::Sender<SyncState>,
}

impl<R: RemoteEntries, A: CredentialResolver> SyncService<R, A> {
    pub fn new(
        engine: SyncEngine<R, A>,
        settings: SyncSettings,
        scheduler: Arc<dyn SyncScheduler>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            engine,
            settings,
            account: None,
            scheduler,
            state,
        }
    }

    /// Authenticate cycles as `account`.
    #[must_use]
    pub fn with_account(mut self, account: Option<AccountRef>) -> Self {
        self.account = account;
        self
    }

    pub const fn engine(&self) -> &SyncEngine<R, A> {
        &self.engine
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Watch state transitions (`Syncing` while a cycle runs).
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Handle one request. Returns `None` when offline mode skipped it.
    ///
    /// A refused incremental window is followed at once by a full cycle; the
    /// report of that second cycle is returned.
    pub async fn handle(&self, request: SyncRequest) -> Option<SyncReport> {
        if self.settings.offline_mode {
            tracing::debug!("Offline mode; skipping {request:?} sync");
            return None;
        }

        self.state.send_replace(SyncState::Syncing);
        let account = self.account.as_ref();
        let mut report = self.engine.run(account, request.is_full()).await;
        if report.full_sync_requested {
            tracing::info!("Running full sync requested by the server");
            report = self.engine.run(account, true).await;
        }

        if report.updated() {
            tracing::info!("Entries updated: {} local changes", report.num_entries);
        }
        if report.invalid_credentials {
            tracing::warn!("Server rejected the credentials; sign in again to keep syncing");
        }

        self.state.send_replace(report.state());
        self.schedule_follow_up(&report);
        Some(report)
    }

    fn schedule_follow_up(&self, report: &SyncReport) {
        if report.network_error() {
            self.scheduler
                .schedule_sync(self.settings.network_retry_interval());
        } else if report.server_error() {
            tracing::warn!("Server error during sync; waiting for the next local change");
        } else {
            self.scheduler.schedule_sync(self.settings.periodic_interval());
        }
    }

    /// Serve requests until every sender is dropped.
    ///
    /// Requests that pile up while a cycle runs are merged into one.
    pub async fn run_worker(&self, mut requests: mpsc::UnboundedReceiver<SyncRequest>) {
        while let Some(mut request) = requests.recv().await {
            while let Ok(queued) = requests.try_recv() {
                request = request.merge(queued);
            }
            self.handle(request).await;
        }
        tracing::debug!("Sync request channel closed; worker stopping");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::Credential;
    use crate::models::RemoteId;
    use crate::remote::{
        DeleteOutcome, EntryList, EntryPayload, RemoteChange, RemoteEntry, RemoteError,
        RemoteResult, WriteOutcome,
    };
    use crate::services::EntryStore;
    use crate::sync::SyncCursor;

    /// Remote that only answers list calls, from a script.
    #[derive(Default)]
    struct ListingRemote {
        responses: Mutex<VecDeque<RemoteResult<EntryList>>>,
        calls: Mutex<Vec<Option<SyncCursor>>>,
    }

    impl ListingRemote {
        fn respond(&self, response: RemoteResult<EntryList>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn calls(&self) -> Vec<Option<SyncCursor>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteEntries for ListingRemote {
        fn set_credential(&self, _credential: Option<Credential>) {}

        async fn create(&self, _payload: &EntryPayload) -> RemoteResult<WriteOutcome> {
            Err(RemoteError::Request("unexpected create".to_string()))
        }

        async fn update(&self, _id: RemoteId, _payload: &EntryPayload) -> RemoteResult<WriteOutcome> {
            Err(RemoteError::Request("unexpected update".to_string()))
        }

        async fn delete(&self, _id: RemoteId) -> RemoteResult<DeleteOutcome> {
            Err(RemoteError::Request("unexpected delete".to_string()))
        }

        async fn list(&self, since: Option<SyncCursor>) -> RemoteResult<EntryList> {
            self.calls.lock().unwrap().push(since);
            self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(EntryList {
                    timestamp: SyncCursor::new(10.0),
                    changes: Vec::new(),
                })
            })
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<Duration>>,
    }

    impl SyncScheduler for RecordingScheduler {
        fn request_immediate_sync(&self) {}

        fn request_lazy_sync(&self) {}

        fn request_full_sync(&self) {}

        fn schedule_sync(&self, delay: Duration) {
            self.scheduled.lock().unwrap().push(delay);
        }
    }

    async fn service(
        settings: SyncSettings,
    ) -> (SyncService<ListingRemote>, Arc<RecordingScheduler>) {
        let store = EntryStore::open_in_memory().await.unwrap();
        let scheduler = Arc::new(RecordingScheduler::default());
        let engine = SyncEngine::new(store, ListingRemote::default());
        (
            SyncService::new(engine, settings, scheduler.clone()),
            scheduler,
        )
    }

    fn upsert(id: i64) -> RemoteChange {
        RemoteChange::Upsert(RemoteEntry {
            id: RemoteId::new(id),
            title: Some(format!("entry {id}")),
            notes: None,
            complete: false,
            created_at: 1,
            modified_at: 1,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_mode_skips_cycle() {
        let (service, scheduler) = service(SyncSettings {
            offline_mode: true,
            ..SyncSettings::default()
        })
        .await;

        assert!(service.handle(SyncRequest::Incremental).await.is_none());
        assert!(service.engine().remote().calls().is_empty());
        assert!(scheduler.scheduled.lock().unwrap().is_empty());
        assert_eq!(service.state(), SyncState::Offline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_success_schedules_periodic_sync() {
        let (service, scheduler) = service(SyncSettings::default()).await;
        let mut states = service.subscribe_state();

        let report = service.handle(SyncRequest::Incremental).await.unwrap();

        assert!(!report.has_errors());
        assert_eq!(service.state(), SyncState::Synced);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SyncState::Synced);
        assert_eq!(
            *scheduler.scheduled.lock().unwrap(),
            vec![Duration::from_secs(900)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_network_failure_schedules_retry() {
        let (service, scheduler) = service(SyncSettings::default()).await;
        service
            .engine()
            .remote()
            .respond(Err(RemoteError::Network("unreachable".to_string())));

        let report = service.handle(SyncRequest::Incremental).await.unwrap();

        assert!(report.network_error());
        assert_eq!(service.state(), SyncState::Offline);
        assert_eq!(
            *scheduler.scheduled.lock().unwrap(),
            vec![Duration::from_secs(30)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_failure_schedules_nothing() {
        let (service, scheduler) = service(SyncSettings::default()).await;
        service.engine().remote().respond(Err(RemoteError::Server {
            status: 500,
            message: "boom".to_string(),
        }));

        let report = service.handle(SyncRequest::Incremental).await.unwrap();

        assert!(report.server_error());
        assert_eq!(service.state(), SyncState::Error);
        assert!(scheduler.scheduled.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refused_window_triggers_full_cycle() {
        let (service, _scheduler) = service(SyncSettings::default()).await;
        let store = service.engine().store();
        store
            .apply_incremental(&EntryList {
                timestamp: SyncCursor::new(1000.0),
                changes: vec![upsert(1)],
            })
            .await
            .unwrap();
        let remote = service.engine().remote();
        remote.respond(Err(RemoteError::Rejected {
            status: 400,
            message: "too old".to_string(),
        }));
        remote.respond(Ok(EntryList {
            timestamp: SyncCursor::new(2000.0),
            changes: vec![upsert(2)],
        }));

        let report = service.handle(SyncRequest::Incremental).await.unwrap();

        assert!(!report.full_sync_requested);
        assert_eq!(report.num_inserts, 1);
        assert_eq!(remote.calls(), vec![Some(SyncCursor::new(1000.0)), None]);
        let rows = store.all_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id, Some(RemoteId::new(2)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_coalesces_queued_requests() {
        let (service, _scheduler) = service(SyncSettings::default()).await;
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(SyncRequest::Incremental).unwrap();
        sender.send(SyncRequest::Full).unwrap();
        sender.send(SyncRequest::Incremental).unwrap();
        drop(sender);

        service.run_worker(receiver).await;

        assert_eq!(service.engine().remote().calls(), vec![None]);
    }
}
