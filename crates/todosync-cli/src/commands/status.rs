use std::path::Path;

use serde::Serialize;
use todosync_core::sync::SyncCursor;

use crate::commands::common::open_store;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub profile: String,
    pub server: Option<String>,
    pub offline_mode: bool,
    pub last_sync: Option<String>,
    pub last_sync_cursor: f64,
    pub visible: usize,
    pub dirty: usize,
    pub staged: usize,
    pub deleting: usize,
    pub in_flight: usize,
}

impl StatusReport {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Database:   {}", self.db_path),
            format!(
                "Profile:    {}{}",
                self.profile,
                if self.offline_mode { " (offline)" } else { "" }
            ),
            format!(
                "Server:     {}",
                self.server.as_deref().unwrap_or("not configured")
            ),
            format!(
                "Last sync:  {}",
                self.last_sync.as_deref().unwrap_or("never")
            ),
            format!("Entries:    {}", self.visible),
        ];

        let outstanding = self.dirty + self.staged + self.deleting;
        if outstanding == 0 {
            lines.push("Pending:    nothing to push".to_string());
        } else {
            lines.push(format!(
                "Pending:    {} edited, {} awaiting confirmation, {} deletions",
                self.dirty, self.staged, self.deleting
            ));
        }
        if self.in_flight > 0 {
            lines.push(format!(
                "In flight:  {} (left by an interrupted sync; recovered on the next run)",
                self.in_flight
            ));
        }
        lines
    }
}

pub async fn collect_status(
    profile: Option<&str>,
    db_path: &Path,
) -> Result<StatusReport, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let store = open_store(db_path).await?;
    let summary = store.pending_summary().await?;
    let cursor = store.last_sync_time().await?;

    Ok(StatusReport {
        db_path: db_path.display().to_string(),
        profile: profile_name,
        server: profile.server_url(),
        offline_mode: profile.sync_settings().offline_mode,
        last_sync: last_sync_label(cursor),
        last_sync_cursor: cursor.get(),
        visible: summary.visible,
        dirty: summary.dirty,
        staged: summary.staged,
        deleting: summary.deleting,
        in_flight: summary.in_flight,
    })
}

pub fn last_sync_label(cursor: SyncCursor) -> Option<String> {
    (!cursor.is_initial()).then(|| cursor.to_string())
}

pub async fn run_status(as_json: bool, profile: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let status = collect_status(profile, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in status.lines() {
            println!("{line}");
        }
    }
    Ok(())
}
