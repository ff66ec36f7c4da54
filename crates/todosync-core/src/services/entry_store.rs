//! Shared entry store used by clients and the sync engine.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};

use crate::db::{
    Database, EntryRepository, RemoteApply, SqliteEntryRepository, SqliteSyncStateRepository,
    SyncStateRepository,
};
use crate::models::{
    Entry, EntryChange, EntryFields, EntryFilter, EntrySort, LocalId, PendingSummary, RemoteId,
};
use crate::remote::{EntryList, RemoteChange, RemoteEntry};
use crate::sync::{NoopScheduler, SyncCursor, SyncScheduler};
use crate::Result;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// One operation of an [`EntryStore::apply_batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Insert(EntryFields),
    Update {
        filter: EntryFilter,
        fields: EntryFields,
    },
    SoftDelete(EntryFilter),
}

/// Outcome of one batch operation, in the same position as its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchResult {
    Inserted(LocalId),
    Affected(usize),
}

/// Local mutations made while applying a remote listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullCounts {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl PullCounts {
    fn record(&mut self, applied: RemoteApply) {
        match applied {
            RemoteApply::Inserted => self.inserts += 1,
            RemoteApply::Updated => self.updates += 1,
            RemoteApply::Deleted => self.deletes += 1,
            RemoteApply::Unchanged => {}
        }
    }

    pub const fn total(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

/// Thread-safe entry store with sync-aware write semantics.
///
/// Local writes mark rows dirty and ask the scheduler for a lazy sync. The
/// bookkeeping operations used by the sync engine are crate-private.
#[derive(Clone)]
pub struct EntryStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    scheduler: Arc<dyn SyncScheduler>,
    changes: broadcast::Sender<EntryChange>,
    cycle: Arc<Mutex<()>>,
}

impl EntryStore {
    /// Open an entry store at the given filesystem path.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        scheduler: Arc<dyn SyncScheduler>,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened entry store at {}", db_path.display());
        Ok(Self::from_database(db, Some(db_path), scheduler))
    }

    /// Open an in-memory entry store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, None, Arc::new(NoopScheduler)))
    }

    fn from_database(
        db: Database,
        db_path: Option<PathBuf>,
        scheduler: Arc<dyn SyncScheduler>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            scheduler,
            changes,
            cycle: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the scheduler that local writes notify.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn SyncScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EntryChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: EntryChange) {
        // Nobody listening is fine
        self.changes.send(change).ok();
    }

    fn notify_filter(&self, filter: &EntryFilter) {
        self.notify(filter.local_id.map_or(EntryChange::Collection, EntryChange::Entry));
    }

    /// Create an entry. It stays dirty until a push confirms it.
    pub async fn insert(&self, fields: EntryFields) -> Result<LocalId> {
        let id = {
            let db = self.db.lock().await;
            SqliteEntryRepository::new(db.connection()).insert(&fields)?
        };
        self.notify(EntryChange::Entry(id));
        self.scheduler.request_lazy_sync();
        Ok(id)
    }

    /// Visible entries matching `filter`, ordered by `sort`.
    pub async fn query(&self, filter: &EntryFilter, sort: EntrySort) -> Result<Vec<Entry>> {
        self.query_limited(filter, sort, None).await
    }

    pub async fn query_limited(
        &self,
        filter: &EntryFilter,
        sort: EntrySort,
        limit: Option<usize>,
    ) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).query(filter, sort, limit)
    }

    /// A visible entry by local id.
    pub async fn get(&self, id: LocalId) -> Result<Option<Entry>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).get(id)
    }

    /// Edit matching visible entries and mark them dirty. Returns the count affected.
    pub async fn update(&self, filter: &EntryFilter, fields: &EntryFields) -> Result<usize> {
        let count = {
            let db = self.db.lock().await;
            SqliteEntryRepository::new(db.connection()).update(filter, fields)?
        };
        if count > 0 {
            self.notify_filter(filter);
            self.scheduler.request_lazy_sync();
        }
        Ok(count)
    }

    /// Hide matching entries until the remote delete is confirmed. Returns the count affected.
    pub async fn soft_delete(&self, filter: &EntryFilter) -> Result<usize> {
        let count = {
            let db = self.db.lock().await;
            SqliteEntryRepository::new(db.connection()).soft_delete(filter)?
        };
        if count > 0 {
            self.notify_filter(filter);
            self.scheduler.request_lazy_sync();
        }
        Ok(count)
    }

    /// Apply several local writes atomically: either all of them land or none do.
    pub async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<Vec<BatchResult>> {
        let results = {
            let mut db = self.db.lock().await;
            let tx = db.connection_mut().transaction()?;
            let repo = SqliteEntryRepository::new(&tx);

            let mut results = Vec::with_capacity(ops.len());
            for op in &ops {
                let result = match op {
                    BatchOp::Insert(fields) => BatchResult::Inserted(repo.insert(fields)?),
                    BatchOp::Update { filter, fields } => {
                        BatchResult::Affected(repo.update(filter, fields)?)
                    }
                    BatchOp::SoftDelete(filter) => BatchResult::Affected(repo.soft_delete(filter)?),
                };
                results.push(result);
            }

            tx.commit()?;
            results
        };

        let changed = results.iter().any(|result| match result {
            BatchResult::Inserted(_) => true,
            BatchResult::Affected(count) => *count > 0,
        });
        if changed {
            self.notify(EntryChange::Collection);
            self.scheduler.request_lazy_sync();
        }
        Ok(results)
    }

    /// Every row, including ones pending deletion, for diagnostics.
    pub async fn all_rows(&self) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).all_rows()
    }

    pub async fn pending_summary(&self) -> Result<PendingSummary> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).pending_summary()
    }

    /// How far the last successful pull reached.
    pub async fn last_sync_time(&self) -> Result<SyncCursor> {
        let db = self.db.lock().await;
        SqliteSyncStateRepository::new(db.connection()).load_cursor()
    }

    /// Hold exclusive access for one sync cycle; a second cycle waits here.
    pub(crate) async fn begin_cycle(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.cycle).lock_owned().await
    }

    /// Remove every row and reset the cursor, in one transaction.
    pub(crate) async fn clear_all(&self) -> Result<usize> {
        let removed = {
            let mut db = self.db.lock().await;
            let tx = db.connection_mut().transaction()?;
            let removed = SqliteEntryRepository::new(&tx).delete_all()?;
            SqliteSyncStateRepository::new(&tx).save_cursor(SyncCursor::INITIAL)?;
            tx.commit()?;
            removed
        };
        self.notify(EntryChange::Collection);
        Ok(removed)
    }

    /// Snapshot dirty rows and mark them staged and in flight, in one transaction.
    ///
    /// The snapshot carries the values from before marking.
    pub(crate) async fn stage_dirty(&self) -> Result<Vec<Entry>> {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let repo = SqliteEntryRepository::new(&tx);

        let leftover = repo.clear_in_flight()?;
        if leftover > 0 {
            tracing::warn!("Recovered {leftover} entries left in flight by an interrupted sync");
        }
        let staged = repo.dirty_rows()?;
        repo.mark_staged()?;

        tx.commit()?;
        Ok(staged)
    }

    pub(crate) async fn hard_delete(&self, id: LocalId) -> Result<bool> {
        let removed = {
            let db = self.db.lock().await;
            SqliteEntryRepository::new(db.connection()).hard_delete(id)?
        };
        if removed {
            self.notify(EntryChange::Entry(id));
        }
        Ok(removed)
    }

    pub(crate) async fn confirm_push(&self, id: LocalId, canonical: &RemoteEntry) -> Result<bool> {
        let updated = {
            let db = self.db.lock().await;
            SqliteEntryRepository::new(db.connection()).confirm_push(id, canonical)?
        };
        if updated {
            self.notify(EntryChange::Entry(id));
        }
        Ok(updated)
    }

    /// Clear the in-flight flag left by staging.
    pub(crate) async fn finish_push(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).clear_in_flight()
    }

    /// Merge an incremental listing and advance the cursor, in one transaction.
    pub(crate) async fn apply_incremental(&self, list: &EntryList) -> Result<PullCounts> {
        let counts = {
            let mut db = self.db.lock().await;
            let tx = db.connection_mut().transaction()?;
            let repo = SqliteEntryRepository::new(&tx);

            let mut counts = PullCounts::default();
            for change in &list.changes {
                let applied = match change {
                    RemoteChange::Upsert(entry) => repo.apply_remote_upsert(entry)?,
                    RemoteChange::Tombstone(id) => repo.apply_remote_delete(*id)?,
                };
                counts.record(applied);
            }
            SqliteSyncStateRepository::new(&tx).save_cursor(list.timestamp)?;

            tx.commit()?;
            counts
        };

        if counts.total() > 0 {
            self.notify(EntryChange::Collection);
        }
        Ok(counts)
    }

    /// Rebuild the table from a full listing, keeping dirty rows, in one transaction.
    ///
    /// Rows whose remote id survives keep their local id. A dirty row whose remote
    /// id is missing from the listing was deleted upstream and is dropped. Counts compare the
    /// listing with the previous table, so re-listing unchanged data counts nothing.
    pub(crate) async fn apply_full(&self, list: &EntryList) -> Result<PullCounts> {
        let counts = {
            let mut db = self.db.lock().await;
            let tx = db.connection_mut().transaction()?;
            let repo = SqliteEntryRepository::new(&tx);

            let previous = repo.all_rows()?;
            let held: Vec<&Entry> = previous.iter().filter(|entry| entry.is_dirty()).collect();
            let by_remote_id: HashMap<RemoteId, &Entry> = previous
                .iter()
                .filter_map(|entry| entry.remote_id.map(|id| (id, entry)))
                .collect();
            repo.delete_all()?;

            let mut counts = PullCounts::default();
            let mut listed = HashSet::new();
            for change in &list.changes {
                let RemoteChange::Upsert(remote) = change else {
                    continue;
                };
                let prior = by_remote_id.get(&remote.id).copied();
                if !repo.insert_remote(remote, prior.map(|entry| entry.local_id))? {
                    tracing::warn!("Full listing repeats entry {}; keeping the first", remote.id);
                    continue;
                }
                listed.insert(remote.id);
                counts.record(match prior {
                    None => RemoteApply::Inserted,
                    Some(entry) if entry.is_dirty() || entry.modified_at == remote.modified_at => {
                        RemoteApply::Unchanged
                    }
                    Some(_) => RemoteApply::Updated,
                });
            }
            for entry in &previous {
                let dropped = entry.remote_id.is_some_and(|id| !listed.contains(&id));
                if dropped && !entry.pending_delete {
                    counts.record(RemoteApply::Deleted);
                }
            }

            for entry in &held {
                repo.restore_held(entry)?;
            }
            SqliteSyncStateRepository::new(&tx).save_cursor(list.timestamp)?;

            tx.commit()?;
            if !held.is_empty() {
                tracing::debug!("Kept {} locally modified entries across full pull", held.len());
            }
            counts
        };

        self.notify(EntryChange::Collection);
        Ok(counts)
    }
}
