//! Database layer for Spendsync

mod connection;
mod kv_store;
mod migrations;

pub use connection::Database;
pub use kv_store::{KeyValueStore, LibSqlKeyValueStore, DEFAULT_NAMESPACE};
