//! Last-known-good mirror of the server's categories

use std::sync::Arc;

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::Category;

use super::snapshot;

/// Storage key holding the cached categories
pub const OFFLINE_CATEGORIES_KEY: &str = "offline_categories";

/// Read-through cache of categories; every save replaces the whole set.
pub struct CategoryCache<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> CategoryCache<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn save(&self, categories: &[Category]) -> Result<()> {
        snapshot::write(self.store.as_ref(), OFFLINE_CATEGORIES_KEY, categories).await
    }

    /// Cached categories; empty when nothing was cached or the cache is unreadable.
    pub async fn load(&self) -> Vec<Category> {
        snapshot::read_lenient(self.store.as_ref(), OFFLINE_CATEGORIES_KEY).await
    }
}
