use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use todosync_core::export;
use todosync_core::EntrySort;

#[derive(Parser)]
#[command(name = "todosync")]
#[command(about = "Offline-first task lists that sync with a todo server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for server and credential configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Quick capture: todosync "Buy milk"
    #[arg(trailing_var_arg = true)]
    pub title: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new entry
    #[command(alias = "new")]
    Add {
        /// Entry title
        title: Vec<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Create the entry already completed
        #[arg(long)]
        done: bool,
    },
    /// List entries
    #[command(alias = "ls")]
    List {
        /// Only entries that are not complete
        #[arg(long, conflicts_with = "done")]
        open: bool,
        /// Only completed entries
        #[arg(long)]
        done: bool,
        /// Only entries whose title contains this text
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,
        /// Sort order
        #[arg(long, value_enum, default_value_t = ListSort::Created)]
        sort: ListSort,
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an entry; opens $EDITOR when no field flags are given
    Edit {
        /// Entry ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark an entry complete
    Done {
        /// Entry ID
        id: String,
    },
    /// Mark an entry not complete
    Undone {
        /// Entry ID
        id: String,
    },
    /// Delete an entry
    #[command(alias = "rm")]
    Delete {
        /// Entry ID
        id: String,
    },
    /// Run one sync cycle against the configured server
    Sync {
        /// Discard the local table and rebuild it from the server
        #[arg(long)]
        full: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending changes and last sync time
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the foreground until interrupted
    Watch,
    /// Export entries
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListSort {
    /// Oldest first
    Created,
    /// Newest first
    Newest,
    /// Most recently modified first
    Modified,
    /// Alphabetical by title
    Title,
}

impl From<ListSort> for EntrySort {
    fn from(sort: ListSort) -> Self {
        match sort {
            ListSort::Created => Self::CreatedAsc,
            ListSort::Newest => Self::CreatedDesc,
            ListSort::Modified => Self::ModifiedDesc,
            ListSort::Title => Self::TitleAsc,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

impl From<CompletionShell> for clap_complete::Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
            CompletionShell::PowerShell => Self::PowerShell,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Server host or URL (e.g. todo.example.com:8080)
        #[arg(long, value_name = "ADDRESS")]
        server: Option<String>,
        /// Use plain HTTP for bare host addresses
        #[arg(long)]
        insecure: bool,
        /// Account name sent to the credential resolver
        #[arg(long, value_name = "NAME")]
        account: Option<String>,
        /// Fixed bearer token for the account
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// Token exchange endpoint issuing short-lived tokens
        #[arg(long, value_name = "URL")]
        token_endpoint: Option<String>,
        /// API key presented to the token exchange endpoint
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Seconds between background syncs in `watch`
        #[arg(long, value_name = "SECONDS")]
        sync_interval: Option<u64>,
        /// Never contact the server from this profile
        #[arg(long, value_name = "BOOL")]
        offline: Option<bool>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile (secrets redacted)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
