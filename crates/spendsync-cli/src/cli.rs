use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "spendsync")]
#[command(about = "Record expenses offline and reconcile them with the server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connectivity, sign-in and queue status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record an expense (queued locally when offline)
    #[command(alias = "new")]
    Add {
        /// Expense name
        name: String,
        /// Amount, e.g. 12.50
        amount: String,
        /// Category ID
        #[arg(short, long, value_name = "UUID")]
        category: String,
        /// Expense date as YYYY-MM-DD (today when omitted)
        #[arg(short, long, value_name = "DATE")]
        date: Option<String>,
        /// Share the expense publicly
        #[arg(long)]
        public: bool,
    },
    /// List expenses waiting to be synced
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push queued expenses to the server
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Work with expense categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Force offline mode on or off
    Offline {
        #[arg(value_enum)]
        mode: OfflineMode,
    },
    /// Sign in to or out of the expense server
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OfflineMode {
    On,
    Off,
}

impl OfflineMode {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List cached categories
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch categories from the server into the local cache
    Refresh,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Exchange username/password for a bearer token and store it
    Login {
        #[arg(long, value_name = "USERNAME")]
        username: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Forget the stored bearer token
    Logout,
}
