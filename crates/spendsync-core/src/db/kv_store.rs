//! Scoped key-value storage backed by libSQL

use crate::error::Result;
use crate::util::unix_millis_now;

use super::Database;

/// Namespace used when the caller doesn't scope storage explicitly
pub const DEFAULT_NAMESPACE: &str = "default";

/// Trait for persisted key-value storage (async)
///
/// Values are opaque strings; callers serialize whole collections into them.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `KeyValueStore`, scoped to one namespace
pub struct LibSqlKeyValueStore {
    db: Database,
    namespace: String,
}

impl LibSqlKeyValueStore {
    /// Create a store over the given database using the default namespace
    pub fn new(db: Database) -> Self {
        Self::with_namespace(db, DEFAULT_NAMESPACE)
    }

    /// Create a store whose keys are isolated under `namespace`
    pub fn with_namespace(db: Database, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl KeyValueStore for LibSqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT value FROM kv_entries WHERE namespace = ? AND key = ?",
                [self.namespace.as_str(), key],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .connection()
            .execute(
                "INSERT INTO kv_entries (namespace, key, value, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(namespace, key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                libsql::params![
                    self.namespace.as_str(),
                    key,
                    value,
                    unix_millis_now()
                ],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db
            .connection()
            .execute(
                "DELETE FROM kv_entries WHERE namespace = ? AND key = ?",
                [self.namespace.as_str(), key],
            )
            .await?;
        Ok(())
    }
}
