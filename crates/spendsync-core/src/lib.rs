//! spendsync-core - Offline reconciliation core for Spendsync
//!
//! This crate keeps expenses recorded without a network connection in a
//! durable local queue and replays them against the expense server once the
//! device is back online. Every client interface (currently the CLI) drives it
//! through [`SyncEngine`].

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod queue;
pub mod state;
pub mod sync;
pub mod util;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{Category, Expense, ExpenseDraft, Identity, LocalId, PendingExpense, RecordedExpense};
pub use state::SyncPhase;
pub use sync::{SyncEngine, SyncReport};
