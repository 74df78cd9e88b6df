//! Synchronization engine: write routing and reconciliation passes.
//!
//! A pass checks connectivity and identity, drains a snapshot of the unsynced
//! queue through the gateway one record at a time in insertion order, then
//! compacts the queue. Records appended while a pass is running are outside
//! its snapshot and wait for the next pass. Only one pass runs at a time; a
//! call that overlaps a running pass returns an empty, skipped report.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::config::ClientConfig;
use crate::connectivity::{ConnectivityOracle, ConnectivityProbe};
use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::gateway::RemoteGateway;
use crate::models::{Category, Expense, ExpenseDraft, LocalId, PendingExpense, RecordedExpense};
use crate::queue::{CategoryCache, OfflineQueue, Preferences};
use crate::state::SyncPhase;

/// Categories fetched by a refresh (first page only)
const CATEGORY_PAGE_LIMIT: u32 = 100;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Expenses the server accepted during this pass, in submission order
    pub synced: Vec<Expense>,
    /// Records the server rejected; they stay queued
    pub failed: Vec<LocalId>,
    /// Records held back because they hit the attempt limit
    pub parked: Vec<LocalId>,
    /// Synced records removed from the queue while settling
    pub compacted: usize,
    /// Another pass was already running, so this one did nothing
    pub skipped: bool,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Offline reconciliation manager used by every client surface.
pub struct SyncEngine<S, G, P> {
    queue: OfflineQueue<S>,
    categories: CategoryCache<S>,
    preferences: Preferences<S>,
    oracle: ConnectivityOracle<P>,
    gateway: G,
    max_submit_attempts: Option<u32>,
    phase: Mutex<SyncPhase>,
}

impl<S, G, P> SyncEngine<S, G, P>
where
    S: KeyValueStore,
    G: RemoteGateway,
    P: ConnectivityProbe,
{
    /// Build an engine using only the configured offline switch.
    pub fn new(store: Arc<S>, gateway: G, probe: P, config: &ClientConfig) -> Self {
        Self {
            queue: OfflineQueue::new(Arc::clone(&store)),
            categories: CategoryCache::new(Arc::clone(&store)),
            preferences: Preferences::new(store),
            oracle: ConnectivityOracle::new(probe, config.force_offline),
            gateway,
            max_submit_attempts: config.max_submit_attempts,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// Build an engine and restore the persisted forced-offline switch.
    pub async fn open(store: Arc<S>, gateway: G, probe: P, config: &ClientConfig) -> Self {
        let engine = Self::new(store, gateway, probe, config);
        if !config.force_offline && engine.preferences.force_offline().await {
            engine.oracle.set_force_offline(true);
        }
        engine
    }

    pub async fn is_online(&self) -> bool {
        self.oracle.is_online().await
    }

    pub fn is_force_offline(&self) -> bool {
        self.oracle.is_force_offline()
    }

    /// Persist and apply the forced-offline switch.
    pub async fn set_force_offline(&self, value: bool) -> Result<()> {
        self.preferences.set_force_offline(value).await?;
        self.oracle.set_force_offline(value);
        Ok(())
    }

    pub fn phase(&self) -> SyncPhase {
        *lock_phase(&self.phase)
    }

    pub const fn queue(&self) -> &OfflineQueue<S> {
        &self.queue
    }

    pub const fn preferences(&self) -> &Preferences<S> {
        &self.preferences
    }

    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Record an expense: queued locally when offline, submitted directly when online.
    ///
    /// Online writes never touch the local queue.
    pub async fn record_expense(&self, mut draft: ExpenseDraft) -> Result<RecordedExpense> {
        draft.validate()?;

        if !self.oracle.is_online().await {
            draft.is_offline = true;
            let pending = self.queue.append(draft).await?;
            tracing::info!("Offline: queued expense {}", pending.local_id);
            return Ok(RecordedExpense::Pending(pending));
        }

        let expense = self.gateway.create_expense(&draft).await?;
        tracing::info!("Expense {} accepted by server", expense.id);
        Ok(RecordedExpense::Confirmed(expense))
    }

    /// Unsynced queued expenses in insertion order.
    pub async fn list_pending_expenses(&self) -> Vec<PendingExpense> {
        self.queue.list_unsynced().await
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.pending_count().await
    }

    /// Run one pass and return the expenses the server accepted.
    pub async fn sync_pending_expenses(&self) -> Result<Vec<Expense>> {
        Ok(self.run_pass().await?.synced)
    }

    /// Run one reconciliation pass.
    ///
    /// Fails as a whole only when offline, unauthenticated, or when queue
    /// bookkeeping hits a storage fault. Individual rejections are reported,
    /// not raised.
    pub async fn run_pass(&self) -> Result<SyncReport> {
        let Some(pass) = PassGuard::enter(&self.phase) else {
            tracing::debug!("Reconciliation pass already running; skipping");
            return Ok(SyncReport::skipped());
        };

        if !self.oracle.is_online().await {
            tracing::info!("Offline; reconciliation pass not started");
            return Err(Error::Offline);
        }

        match self.gateway.current_identity().await {
            Ok(Some(identity)) => {
                tracing::debug!("Reconciling as {}", identity.username);
            }
            Ok(None) => {
                return Err(Error::AuthRequired("no signed-in user".to_string()));
            }
            Err(error) => {
                tracing::warn!("Identity probe failed: {}", error);
                return Err(Error::AuthRequired(error.to_string()));
            }
        }

        pass.advance(SyncPhase::Draining);
        let snapshot = self.queue.list_unsynced().await;
        let mut report = SyncReport::default();
        let mut accepted: Vec<&LocalId> = Vec::new();

        for record in &snapshot {
            if let Some(limit) = self.max_submit_attempts {
                if record.attempts >= limit {
                    tracing::warn!(
                        "Holding back expense {} after {} failed attempts",
                        record.local_id,
                        record.attempts
                    );
                    report.parked.push(record.local_id.clone());
                    continue;
                }
            }

            match self.gateway.create_expense(record.submission()).await {
                Ok(expense) => {
                    accepted.push(&record.local_id);
                    if let Err(error) = self.queue.mark_synced(&record.local_id).await {
                        let accepted = join_ids(&accepted);
                        tracing::error!(
                            "Server accepted expense {} but marking it synced failed: {}; \
                             accepted this pass: {}",
                            record.local_id,
                            error,
                            accepted
                        );
                        return Err(Error::StorageFault(format!(
                            "{error}; server already accepted {accepted}"
                        )));
                    }
                    report.synced.push(expense);
                }
                Err(error) => {
                    tracing::warn!("Failed to sync expense {}: {}", record.local_id, error);
                    self.queue.record_failure(&record.local_id).await?;
                    report.failed.push(record.local_id.clone());
                }
            }
        }

        pass.advance(SyncPhase::Settling);
        report.compacted = self.queue.compact().await?;

        tracing::info!(
            "Reconciliation pass finished: {} synced, {} failed, {} held back",
            report.synced.len(),
            report.failed.len(),
            report.parked.len()
        );
        Ok(report)
    }

    /// Replace the cached categories.
    pub async fn save_categories(&self, categories: &[Category]) -> Result<()> {
        self.categories.save(categories).await
    }

    /// Cached categories, for use while offline.
    pub async fn get_categories(&self) -> Vec<Category> {
        self.categories.load().await
    }

    /// Fetch categories from the server into the cache.
    ///
    /// Falls back to the cached set when offline or when the server fails.
    pub async fn refresh_categories(&self) -> Result<Vec<Category>> {
        if !self.oracle.is_online().await {
            return Ok(self.categories.load().await);
        }

        match self.gateway.list_categories(0, CATEGORY_PAGE_LIMIT).await {
            Ok(page) => {
                self.categories.save(&page.items).await?;
                tracing::debug!("Cached {} categories", page.items.len());
                Ok(page.items)
            }
            Err(error) => {
                tracing::warn!("Category refresh failed, using cached set: {}", error);
                Ok(self.categories.load().await)
            }
        }
    }
}

/// Holds the engine's phase for the duration of one pass.
struct PassGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
}

impl<'a> PassGuard<'a> {
    fn enter(phase: &'a Mutex<SyncPhase>) -> Option<Self> {
        let mut current = lock_phase(phase);
        if !current.is_idle() {
            return None;
        }
        *current = SyncPhase::Checking;
        drop(current);
        tracing::debug!("Sync phase -> {}", SyncPhase::Checking);
        Some(Self { phase })
    }

    fn advance(&self, next: SyncPhase) {
        *lock_phase(self.phase) = next;
        tracing::debug!("Sync phase -> {}", next);
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *lock_phase(self.phase) = SyncPhase::Idle;
    }
}

fn join_ids(ids: &[&LocalId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn lock_phase(phase: &Mutex<SyncPhase>) -> MutexGuard<'_, SyncPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}
