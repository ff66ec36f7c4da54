use std::path::Path;
use std::sync::Arc;

use todosync_core::sync::{NoopScheduler, SyncRequest};
use todosync_core::{SyncEngine, SyncReport, SyncService};

use crate::commands::common::open_store;
use crate::error::CliError;
use crate::sync_profile::load_sync_target;

pub async fn run_sync(
    full: bool,
    as_json: bool,
    profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let target = load_sync_target(profile)?;
    let store = open_store(db_path).await?;
    let client = target.client()?;

    let engine = SyncEngine::new(store, client).with_credentials(target.credentials);
    let service = SyncService::new(engine, target.settings, Arc::new(NoopScheduler))
        .with_account(target.account);
    let request = if full {
        SyncRequest::Full
    } else {
        SyncRequest::Incremental
    };

    let Some(report) = service.handle(request).await else {
        println!("Profile '{}' is in offline mode; nothing synced.", target.profile_name);
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_sync_report(&report));
    }

    if report.has_errors() {
        return Err(CliError::SyncFailed(report.summary()));
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut output = format!("Sync {}: {}", report.state(), report.summary());
    if report.invalid_credentials {
        output.push_str("\nThe server rejected the configured credentials.");
    }
    output
}
