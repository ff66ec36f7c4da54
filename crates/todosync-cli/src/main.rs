//! todosync CLI - offline-first task lists from the terminal
//!
//! Entries are written to a local database first and reconciled with the
//! configured todo server by `todosync sync` or a running `todosync watch`.

mod cli;
mod commands;
mod config_profiles;
mod error;
mod sync_profile;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::done::run_set_complete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::commands::list::{run_list, ListOptions};
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVES: &str = "todosync=info,todosync_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        command => {
            let db_path = resolve_db_path(cli.db_path)?;
            match command {
                Some(Commands::Add { title, notes, done }) => {
                    run_add(&title, notes, done, &db_path).await?;
                }
                Some(Commands::List {
                    open,
                    done,
                    search,
                    sort,
                    limit,
                    json,
                }) => {
                    let options = ListOptions {
                        complete: complete_filter(open, done),
                        search,
                        sort: sort.into(),
                        limit,
                    };
                    run_list(&options, json, &db_path).await?;
                }
                Some(Commands::Edit { id, title, notes }) => {
                    run_edit(&id, title, notes, &db_path).await?;
                }
                Some(Commands::Done { id }) => run_set_complete(&id, true, &db_path).await?,
                Some(Commands::Undone { id }) => run_set_complete(&id, false, &db_path).await?,
                Some(Commands::Delete { id }) => run_delete(&id, &db_path).await?,
                Some(Commands::Sync { full, json }) => {
                    run_sync(full, json, profile, &db_path).await?;
                }
                Some(Commands::Status { json }) => run_status(json, profile, &db_path).await?,
                Some(Commands::Watch) => run_watch(profile, &db_path).await?,
                Some(Commands::Export { format, output }) => {
                    run_export(format, output.as_deref(), &db_path).await?;
                }
                Some(Commands::Completions { .. } | Commands::Config { .. }) => {}
                None => {
                    // Quick capture mode: todosync "Buy milk"
                    if cli.title.is_empty() {
                        Cli::command().print_help().map_err(CliError::Io)?;
                        println!();
                    } else {
                        run_add(&cli.title, None, false, &db_path).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

const fn complete_filter(open: bool, done: bool) -> Option<bool> {
    match (open, done) {
        (true, _) => Some(false),
        (false, true) => Some(true),
        (false, false) => None,
    }
}
