//! Versioned JSON envelopes for whole collections kept in the key-value store

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::db::KeyValueStore;
use crate::error::{Error, Result};

/// Layout version written with every persisted collection
pub const COLLECTION_SCHEMA_VERSION: u64 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    schema_version: u64,
    items: &'a [T],
}

#[derive(Debug)]
enum DecodeError {
    Corrupt(String),
    UnsupportedVersion(u64),
}

/// One stored item: decoded, or kept verbatim when it doesn't parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Slot<T> {
    Known(T),
    Opaque(Value),
}

/// A collection loaded for rewriting.
///
/// Items that fail to decode stay in place and are written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn push(&mut self, item: T) {
        self.slots.push(Slot::Known(item));
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Known(item) => Some(item),
            Slot::Opaque(_) => None,
        })
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Known(item) => Some(item),
            Slot::Opaque(_) => None,
        })
    }

    /// Drop decoded items for which `keep` is false; returns how many were dropped.
    pub fn retain_items(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| match slot {
            Slot::Known(item) => keep(item),
            Slot::Opaque(_) => true,
        });
        before - self.slots.len()
    }

    /// Number of stored items this client could not decode.
    pub fn opaque_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Opaque(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Split either the current envelope or a bare legacy array into raw items.
fn decode_items(raw: &str) -> std::result::Result<Vec<Value>, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|error| DecodeError::Corrupt(error.to_string()))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut fields) => {
            let version = fields
                .get("schema_version")
                .and_then(Value::as_u64)
                .ok_or_else(|| DecodeError::Corrupt("missing schema_version".to_string()))?;
            if version > COLLECTION_SCHEMA_VERSION {
                return Err(DecodeError::UnsupportedVersion(version));
            }
            match fields.remove("items") {
                Some(Value::Array(items)) => Ok(items),
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(other) => Err(DecodeError::Corrupt(format!(
                    "expected items array, found {other}"
                ))),
            }
        }
        other => Err(DecodeError::Corrupt(format!(
            "expected array or object, found {other}"
        ))),
    }
}

fn decode_item<T: DeserializeOwned>(key: &str, index: usize, item: Value) -> Slot<T> {
    match serde_json::from_value(item.clone()) {
        Ok(decoded) => Slot::Known(decoded),
        Err(error) => {
            tracing::warn!("Skipping unreadable item {} of '{}': {}", index, key, error);
            Slot::Opaque(item)
        }
    }
}

/// Read a collection for display.
///
/// Unreadable storage or a corrupt blob reads as empty; single items that
/// don't decode are skipped.
pub async fn read_lenient<S, T>(store: &S, key: &str) -> Vec<T>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(error) => {
            tracing::warn!("Failed to read '{}' from local storage: {}", key, error);
            return Vec::new();
        }
    };

    match decode_items(&raw) {
        Ok(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match decode_item(key, index, item) {
                Slot::Known(decoded) => Some(decoded),
                Slot::Opaque(_) => None,
            })
            .collect(),
        Err(DecodeError::Corrupt(reason)) => {
            tracing::warn!("Ignoring corrupt '{}' collection: {}", key, reason);
            Vec::new()
        }
        Err(DecodeError::UnsupportedVersion(version)) => {
            tracing::warn!(
                "Ignoring '{}' collection written by a newer client (schema_version {})",
                key,
                version
            );
            Vec::new()
        }
    }
}

/// Read a collection that is about to be rewritten.
///
/// A failed read or a newer layout is a fault, since rewriting would discard
/// data this client cannot see. Items that don't decode are carried along
/// verbatim. A blob that isn't a collection at all is replaced.
pub async fn read_for_write<S, T>(store: &S, key: &str) -> Result<Collection<T>>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await.map_err(storage_fault)? else {
        return Ok(Collection::default());
    };

    match decode_items(&raw) {
        Ok(items) => Ok(Collection {
            slots: items
                .into_iter()
                .enumerate()
                .map(|(index, item)| decode_item(key, index, item))
                .collect(),
        }),
        Err(DecodeError::Corrupt(reason)) => {
            tracing::warn!("Replacing corrupt '{}' collection: {}", key, reason);
            Ok(Collection::default())
        }
        Err(DecodeError::UnsupportedVersion(version)) => Err(Error::StorageFault(format!(
            "'{key}' uses schema_version {version}, newer than supported {COLLECTION_SCHEMA_VERSION}"
        ))),
    }
}

/// Serialize the whole collection and store it under `key`.
pub async fn write<S, T>(store: &S, key: &str, items: &[T]) -> Result<()>
where
    S: KeyValueStore,
    T: Serialize,
{
    write_envelope(store, key, items).await
}

/// Store a collection loaded with `read_for_write`, undecoded items included.
pub async fn write_collection<S, T>(store: &S, key: &str, collection: &Collection<T>) -> Result<()>
where
    S: KeyValueStore,
    T: Serialize,
{
    write_envelope(store, key, &collection.slots).await
}

async fn write_envelope<S, T>(store: &S, key: &str, items: &[T]) -> Result<()>
where
    S: KeyValueStore,
    T: Serialize,
{
    let payload = serde_json::to_string(&EnvelopeRef {
        schema_version: COLLECTION_SCHEMA_VERSION,
        items,
    })
    .map_err(|error| storage_fault(error.into()))?;
    store.set(key, &payload).await.map_err(storage_fault)?;
    tracing::debug!("Persisted {} item(s) under '{}'", items.len(), key);
    Ok(())
}

pub fn storage_fault(error: Error) -> Error {
    match error {
        Error::StorageFault(_) => error,
        other => Error::StorageFault(other.to_string()),
    }
}
