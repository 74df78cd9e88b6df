//! Small persisted flags: forced offline mode and the stored bearer token

use std::sync::Arc;

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::util::parse_flag;

use super::snapshot::storage_fault;

/// Storage key for the user-selected offline mode
pub const FORCE_OFFLINE_KEY: &str = "force_offline_mode";
/// Storage key for the server bearer token
pub const AUTH_TOKEN_KEY: &str = "auth_token";

pub struct Preferences<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> Preferences<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persisted forced-offline flag; unreadable values count as not forced.
    pub async fn force_offline(&self) -> bool {
        match self.store.get(FORCE_OFFLINE_KEY).await {
            Ok(Some(value)) => parse_flag(&value).unwrap_or(false),
            Ok(None) => false,
            Err(error) => {
                tracing::warn!("Failed to read forced offline flag: {}", error);
                false
            }
        }
    }

    pub async fn set_force_offline(&self, value: bool) -> Result<()> {
        let value = if value { "true" } else { "false" };
        self.store
            .set(FORCE_OFFLINE_KEY, value)
            .await
            .map_err(storage_fault)
    }

    pub async fn auth_token(&self) -> Result<Option<String>> {
        let token = self.store.get(AUTH_TOKEN_KEY).await.map_err(storage_fault)?;
        Ok(crate::util::normalize_text_option(token))
    }

    pub async fn set_auth_token(&self, token: &str) -> Result<()> {
        self.store
            .set(AUTH_TOKEN_KEY, token.trim())
            .await
            .map_err(storage_fault)
    }

    pub async fn clear_auth_token(&self) -> Result<()> {
        self.store.remove(AUTH_TOKEN_KEY).await.map_err(storage_fault)
    }
}
