//! Outcome of a sync cycle.

use serde::Serialize;

use crate::auth::AuthError;
use crate::remote::{FailureKind, RemoteError};
use crate::services::PullCounts;
use crate::state::SyncState;

/// Progress marker of a cycle. A cycle that stops early keeps the last phase it completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    AuthResolved,
    Pushed,
    Pulled,
    Done,
}

/// Counters and flags collected over one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub phase: SyncPhase,
    /// The incremental listing was refused; run a new cycle with a full pull.
    pub full_sync_requested: bool,
    pub num_inserts: u64,
    pub num_updates: u64,
    pub num_deletes: u64,
    /// Local rows touched by the pull
    pub num_entries: u64,
    pub num_upstream_inserts: u64,
    pub num_upstream_updates: u64,
    pub num_upstream_deletes: u64,
    pub network_errors: u64,
    pub server_errors: u64,
    pub request_errors: u64,
    pub auth_errors: u64,
    /// Local database failures while syncing
    pub store_errors: u64,
    pub invalid_credentials: bool,
}

impl SyncReport {
    /// Whether the pull changed local data. Push bookkeeping never counts.
    pub const fn updated(&self) -> bool {
        self.num_deletes > 0 || self.num_inserts > 0 || self.num_updates > 0
    }

    pub const fn network_error(&self) -> bool {
        self.network_errors > 0
    }

    pub const fn server_error(&self) -> bool {
        self.server_errors > 0
    }

    pub const fn authentication_error(&self) -> bool {
        self.auth_errors > 0
    }

    pub const fn store_error(&self) -> bool {
        self.store_errors > 0
    }

    pub const fn has_errors(&self) -> bool {
        self.network_error()
            || self.server_error()
            || self.authentication_error()
            || self.store_error()
            || self.request_errors > 0
    }

    pub const fn num_upstream(&self) -> u64 {
        self.num_upstream_inserts + self.num_upstream_updates + self.num_upstream_deletes
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::Network => self.network_errors += 1,
            FailureKind::Server => self.server_errors += 1,
            FailureKind::Request => self.request_errors += 1,
            FailureKind::Auth => self.auth_errors += 1,
        }
    }

    pub fn record_remote_error(&mut self, error: &RemoteError) {
        self.record_failure(error.kind());
        if error.is_invalid_credentials() {
            self.invalid_credentials = true;
        }
    }

    pub fn record_auth_error(&mut self, error: &AuthError) {
        match error {
            AuthError::InvalidCredentials(_) => {
                self.auth_errors += 1;
                self.invalid_credentials = true;
            }
            AuthError::NotConfigured(_) | AuthError::Denied(_) => self.auth_errors += 1,
            AuthError::Network(_) => self.network_errors += 1,
            AuthError::Request(_) => self.request_errors += 1,
        }
    }

    pub fn record_store_error(&mut self, error: &crate::Error) {
        tracing::error!("Local store failure during sync: {error}");
        self.store_errors += 1;
    }

    pub(crate) fn record_pull(&mut self, counts: PullCounts) {
        self.num_inserts += counts.inserts;
        self.num_updates += counts.updates;
        self.num_deletes += counts.deletes;
        self.num_entries += counts.total();
    }

    pub(crate) fn advance(&mut self, phase: SyncPhase) {
        self.phase = self.phase.max(phase);
    }

    /// Whether the pull phase may run after the push phase.
    pub(crate) const fn can_pull(&self) -> bool {
        !(self.network_error() || self.server_error() || self.store_error())
    }

    pub const fn state(&self) -> SyncState {
        if self.network_error() {
            SyncState::Offline
        } else if self.has_errors() {
            SyncState::Error
        } else {
            SyncState::Synced
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "pulled {} new, {} changed, {} removed; pushed {} new, {} changed, {} removed",
            self.num_inserts,
            self.num_updates,
            self.num_deletes,
            self.num_upstream_inserts,
            self.num_upstream_updates,
            self.num_upstream_deletes
        );

        let failures = [
            (self.network_errors, "network"),
            (self.server_errors, "server"),
            (self.request_errors, "request"),
            (self.auth_errors, "auth"),
            (self.store_errors, "store"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect::<Vec<_>>();
        if !failures.is_empty() {
            summary.push_str("; failures: ");
            summary.push_str(&failures.join(", "));
        }
        if self.full_sync_requested {
            summary.push_str("; full sync required");
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updated_ignores_upstream_counters() {
        let report = SyncReport {
            num_upstream_inserts: 3,
            num_upstream_deletes: 1,
            ..SyncReport::default()
        };
        assert!(!report.updated());

        let pulled = SyncReport {
            num_deletes: 1,
            ..SyncReport::default()
        };
        assert!(pulled.updated());
    }

    #[test]
    fn invalid_credentials_is_distinct_from_updates() {
        let mut report = SyncReport::default();
        report.record_auth_error(&AuthError::InvalidCredentials("alice".into()));

        assert!(report.authentication_error());
        assert!(report.invalid_credentials);
        assert!(!report.updated());
        assert!(report.can_pull());
        assert_eq!(report.state(), SyncState::Error);
    }

    #[test]
    fn network_failures_block_pull_and_read_as_offline() {
        let mut report = SyncReport::default();
        report.record_remote_error(&RemoteError::Network("reset".into()));

        assert!(!report.can_pull());
        assert_eq!(report.state(), SyncState::Offline);
    }

    #[test]
    fn phase_never_moves_backwards() {
        let mut report = SyncReport::default();
        report.advance(SyncPhase::Pulled);
        report.advance(SyncPhase::Pushed);
        assert_eq!(report.phase, SyncPhase::Pulled);
    }

    #[test]
    fn summary_lists_failures() {
        let report = SyncReport {
            num_inserts: 2,
            server_errors: 1,
            full_sync_requested: true,
            ..SyncReport::default()
        };
        assert_eq!(
            report.summary(),
            "pulled 2 new, 0 changed, 0 removed; pushed 0 new, 0 changed, 0 removed; \
             failures: 1 server; full sync required"
        );
    }
}
