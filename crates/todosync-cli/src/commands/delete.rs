use std::path::Path;

use todosync_core::EntryFilter;

use crate::commands::common::{open_store, require_entry};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let entry = require_entry(&store, id).await?;

    store.soft_delete(&EntryFilter::by_id(entry.local_id)).await?;
    println!("{}", entry.local_id);
    Ok(())
}
