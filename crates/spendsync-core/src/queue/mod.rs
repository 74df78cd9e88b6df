//! Local durable queue of expenses awaiting server confirmation
//!
//! The whole queue lives under one storage key and every mutation rewrites it.
//! Mutations are serialized through a write lock so a rewrite never drops a
//! record appended concurrently.

mod categories;
mod preferences;
pub mod snapshot;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::{ExpenseDraft, LocalId, PendingExpense};

pub use categories::CategoryCache;
pub use snapshot::Collection;
pub use preferences::Preferences;

/// Storage key holding the serialized queue
pub const OFFLINE_EXPENSES_KEY: &str = "offline_expenses";

/// Persistent queue of `PendingExpense` records in insertion order
pub struct OfflineQueue<S> {
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> OfflineQueue<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Queue a draft under a fresh local id.
    ///
    /// On error nothing was saved.
    pub async fn append(&self, expense: ExpenseDraft) -> Result<PendingExpense> {
        let _write = self.write_lock.lock().await;
        let mut records: Collection<PendingExpense> =
            snapshot::read_for_write(self.store.as_ref(), OFFLINE_EXPENSES_KEY).await?;

        let pending = PendingExpense::new(expense);
        records.push(pending.clone());
        snapshot::write_collection(self.store.as_ref(), OFFLINE_EXPENSES_KEY, &records).await?;

        tracing::debug!("Queued offline expense {}", pending.local_id);
        Ok(pending)
    }

    /// Every stored record, synced or not, in insertion order.
    pub async fn list_all(&self) -> Vec<PendingExpense> {
        snapshot::read_lenient(self.store.as_ref(), OFFLINE_EXPENSES_KEY).await
    }

    /// Records still waiting for the server, in insertion order.
    pub async fn list_unsynced(&self) -> Vec<PendingExpense> {
        unsynced(self.list_all().await)
    }

    /// Number of unsynced records, recomputed from storage on every call.
    pub async fn pending_count(&self) -> usize {
        self.list_unsynced().await.len()
    }

    /// Flag a record as accepted by the server. Unknown ids are ignored.
    pub async fn mark_synced(&self, local_id: &LocalId) -> Result<()> {
        self.update(local_id, |record| {
            if record.is_synced {
                false
            } else {
                record.is_synced = true;
                true
            }
        })
        .await
    }

    /// Count one more rejected submission for a record. Unknown ids are ignored.
    pub async fn record_failure(&self, local_id: &LocalId) -> Result<()> {
        self.update(local_id, |record| {
            record.attempts = record.attempts.saturating_add(1);
            true
        })
        .await
    }

    /// Drop synced records, keeping unsynced ones in order.
    ///
    /// Stored items that don't decode are never dropped. Returns how many
    /// records were removed.
    pub async fn compact(&self) -> Result<usize> {
        let _write = self.write_lock.lock().await;
        let mut remaining: Collection<PendingExpense> =
            snapshot::read_for_write(self.store.as_ref(), OFFLINE_EXPENSES_KEY).await?;

        let removed = remaining.retain_items(|record| !record.is_synced);
        snapshot::write_collection(self.store.as_ref(), OFFLINE_EXPENSES_KEY, &remaining).await?;

        tracing::debug!(
            "Compacted offline queue: removed {}, kept {}",
            removed,
            remaining.len()
        );
        Ok(removed)
    }

    async fn update(
        &self,
        local_id: &LocalId,
        apply: impl FnOnce(&mut PendingExpense) -> bool,
    ) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let mut records: Collection<PendingExpense> =
            snapshot::read_for_write(self.store.as_ref(), OFFLINE_EXPENSES_KEY).await?;

        let Some(record) = records.items_mut().find(|record| &record.local_id == local_id) else {
            tracing::debug!("No queued expense with id {}", local_id);
            return Ok(());
        };
        if !apply(record) {
            return Ok(());
        }

        snapshot::write_collection(self.store.as_ref(), OFFLINE_EXPENSES_KEY, &records).await
    }
}

fn unsynced(records: Vec<PendingExpense>) -> Vec<PendingExpense> {
    records
        .into_iter()
        .filter(|record| !record.is_synced)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::db::{Database, LibSqlKeyValueStore};
    use crate::Error;

    async fn setup() -> (Arc<LibSqlKeyValueStore>, OfflineQueue<LibSqlKeyValueStore>) {
        let db = Database::open_in_memory().await.unwrap();
        let store = Arc::new(LibSqlKeyValueStore::new(db));
        let queue = OfflineQueue::new(Arc::clone(&store));
        (store, queue)
    }

    fn draft(name: &str) -> ExpenseDraft {
        ExpenseDraft::new(
            name,
            dec!(10.00),
            Uuid::nil(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_appends_are_listed_in_order_with_unique_ids() {
        let (_, queue) = setup().await;
        for name in ["A", "B", "C", "D"] {
            queue.append(draft(name)).await.unwrap();
        }

        let unsynced = queue.list_unsynced().await;
        let names: Vec<&str> = unsynced.iter().map(|r| r.expense.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);

        let ids: HashSet<&LocalId> = unsynced.iter().map(|r| &r.local_id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(queue.pending_count().await, 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_round_trips_domain_fields() {
        let (_, queue) = setup().await;
        let expense = draft("Groceries").public(true);
        let pending = queue.append(expense.clone()).await.unwrap();

        let all = queue.list_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].expense, expense);
        assert_eq!(all[0].local_id, pending.local_id);
        assert!(!all[0].is_synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_valid_amounts_round_trip_exactly() {
        let (_, queue) = setup().await;
        for amount in [dec!(0.01), dec!(0.1), dec!(19.99), dec!(1234.56), dec!(999999999999.99)] {
            let mut expense = draft("Amount");
            expense.amount = amount;
            expense.validate().unwrap();
            queue.append(expense).await.unwrap();
        }

        let amounts: Vec<_> = queue
            .list_all()
            .await
            .into_iter()
            .map(|record| record.expense.amount)
            .collect();
        assert_eq!(
            amounts,
            vec![dec!(0.01), dec!(0.1), dec!(19.99), dec!(1234.56), dec!(999999999999.99)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_is_idempotent() {
        let (_, queue) = setup().await;
        let first = queue.append(draft("A")).await.unwrap();
        queue.append(draft("B")).await.unwrap();

        queue.mark_synced(&first.local_id).await.unwrap();
        let once = queue.list_all().await;
        queue.mark_synced(&first.local_id).await.unwrap();
        let twice = queue.list_all().await;

        assert_eq!(once, twice);
        assert_eq!(queue.pending_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_unknown_id_is_noop() {
        let (_, queue) = setup().await;
        queue.append(draft("A")).await.unwrap();
        let before = queue.list_all().await;

        let unknown: LocalId = "offline_1_missing".parse().unwrap();
        queue.mark_synced(&unknown).await.unwrap();

        assert_eq!(queue.list_all().await, before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_compact_keeps_exactly_unsynced_records() {
        let (_, queue) = setup().await;
        let mut ids = Vec::new();
        for name in ["A", "B", "C", "D", "E"] {
            ids.push(queue.append(draft(name)).await.unwrap().local_id);
        }
        queue.mark_synced(&ids[1]).await.unwrap();
        queue.mark_synced(&ids[3]).await.unwrap();

        let expected = queue.list_unsynced().await;
        let removed = queue.compact().await.unwrap();
        let after = queue.list_all().await;

        assert_eq!(removed, 2);
        assert_eq!(after, expected);
        assert!(after.iter().all(|record| !record.is_synced));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_failure_counts_attempts() {
        let (_, queue) = setup().await;
        let pending = queue.append(draft("A")).await.unwrap();

        queue.record_failure(&pending.local_id).await.unwrap();
        queue.record_failure(&pending.local_id).await.unwrap();

        assert_eq!(queue.list_all().await[0].attempts, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_corrupt_storage_reads_as_empty() {
        let (store, queue) = setup().await;
        store.set(OFFLINE_EXPENSES_KEY, "{not json").await.unwrap();

        assert!(queue.list_all().await.is_empty());
        assert_eq!(queue.pending_count().await, 0);

        // The next append replaces the unreadable blob
        queue.append(draft("A")).await.unwrap();
        assert_eq!(queue.list_all().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_legacy_array_layout_is_read_and_upgraded() {
        let (store, queue) = setup().await;
        let legacy = r#"[{
            "name": "Taxi",
            "amount": 31.0,
            "category_id": "00000000-0000-0000-0000-000000000000",
            "is_offline": true,
            "is_public": false,
            "timestamp": "2024-04-02",
            "local_id": "offline_1712000000000_q1w2e3r4t5",
            "is_synced": false
        }]"#;
        store.set(OFFLINE_EXPENSES_KEY, legacy).await.unwrap();

        assert_eq!(queue.list_unsynced().await[0].expense.name, "Taxi");

        queue.append(draft("A")).await.unwrap();
        let raw = store.get(OFFLINE_EXPENSES_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_record_does_not_cost_the_others() {
        let (store, queue) = setup().await;
        let stored = r#"[{
            "name": "Taxi",
            "amount": 31.0,
            "category_id": "00000000-0000-0000-0000-000000000000",
            "is_offline": true,
            "is_public": false,
            "timestamp": "2024-04-02",
            "local_id": "offline_1712000000000_q1w2e3r4t5",
            "is_synced": false
        }, {
            "name": "Blank",
            "amount": null,
            "category_id": "00000000-0000-0000-0000-000000000000",
            "timestamp": "2024-04-02",
            "local_id": "offline_1712000000001_a1s2d3f4g5",
            "is_synced": false
        }]"#;
        store.set(OFFLINE_EXPENSES_KEY, stored).await.unwrap();

        let names = |records: Vec<PendingExpense>| {
            records
                .into_iter()
                .map(|record| record.expense.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(queue.list_all().await), vec!["Taxi"]);

        let removed = queue.compact().await.unwrap();
        let added = queue.append(draft("A")).await.unwrap();
        let taxi: LocalId = "offline_1712000000000_q1w2e3r4t5".parse().unwrap();
        queue.mark_synced(&taxi).await.unwrap();

        assert_eq!(removed, 0);
        assert_eq!(names(queue.list_unsynced().await), vec!["A"]);
        assert_eq!(queue.list_unsynced().await[0].local_id, added.local_id);

        // The unreadable record is still stored as it was
        let raw = store.get(OFFLINE_EXPENSES_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let items = value["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["name"], "Blank");
        assert!(items[1]["amount"].is_null());

        queue.compact().await.unwrap();
        let raw = store.get(OFFLINE_EXPENSES_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_newer_layout_is_never_overwritten() {
        let (store, queue) = setup().await;
        let future = r#"{"schema_version": 7, "items": []}"#;
        store.set(OFFLINE_EXPENSES_KEY, future).await.unwrap();

        assert!(queue.list_all().await.is_empty());
        let error = queue.append(draft("A")).await.unwrap_err();
        assert!(matches!(error, Error::StorageFault(_)));
        assert_eq!(
            store.get(OFFLINE_EXPENSES_KEY).await.unwrap().as_deref(),
            Some(future)
        );
    }
}
