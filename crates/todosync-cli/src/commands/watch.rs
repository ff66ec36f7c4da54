use std::path::Path;
use std::sync::Arc;

use todosync_core::sync::{ChannelScheduler, SyncScheduler};
use todosync_core::{EntryStore, SyncEngine, SyncService};

use crate::error::CliError;
use crate::sync_profile::load_sync_target;

/// Sync in the foreground: once now, then on the service's schedule, until Ctrl-C.
pub async fn run_watch(profile: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let target = load_sync_target(profile)?;
    if target.settings.offline_mode {
        println!("Profile '{}' is in offline mode; nothing to watch.", target.profile_name);
        return Ok(());
    }

    let (scheduler, requests) = ChannelScheduler::new(target.settings.lazy_interval());
    let scheduler = Arc::new(scheduler);
    let store = EntryStore::open_path(db_path.to_path_buf(), scheduler.clone()).await?;
    let client = target.client()?;

    let engine = SyncEngine::new(store, client).with_credentials(target.credentials);
    let service = SyncService::new(engine, target.settings, scheduler.clone())
        .with_account(target.account);

    let mut states = service.subscribe_state();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("{} {state}", chrono::Local::now().format("%H:%M:%S"));
        }
    });

    println!(
        "Watching {} (every {}s). Press Ctrl-C to stop.",
        target.base_url,
        service.settings().periodic_interval_secs
    );
    scheduler.request_immediate_sync();

    tokio::select! {
        () = service.run_worker(requests) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            println!("Stopping.");
        }
    }

    scheduler.cancel_pending();
    printer.abort();
    Ok(())
}
