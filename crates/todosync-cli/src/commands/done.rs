use std::path::Path;

use todosync_core::{EntryFields, EntryFilter};

use crate::commands::common::{open_store, require_entry};
use crate::error::CliError;

pub async fn run_set_complete(id: &str, complete: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let entry = require_entry(&store, id).await?;

    if entry.complete != complete {
        store
            .update(
                &EntryFilter::by_id(entry.local_id),
                &EntryFields::default().with_complete(complete),
            )
            .await?;
    }

    println!("{}", entry.local_id);
    Ok(())
}
