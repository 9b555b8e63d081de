//! Redirect state store: correlates a handshake id with caller state
//!
//! Caller state is serialized to JSON and written to session storage under
//! `"{prefix}.{handshake_id}"` before the page navigates to the gateway. The
//! callback route carries the id as its last path segment, which is how the
//! state is found again after the navigation wiped process memory.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::capabilities::{SessionStorage, SharedSessionStorage};
use crate::error::{AuthError, Result};
use crate::types::HandshakeId;

/// Session-storage backed handshake records, namespaced by a key prefix
#[derive(Clone)]
pub struct RedirectStateStore {
    storage: SharedSessionStorage,
    prefix: String,
}

impl std::fmt::Debug for RedirectStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectStateStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedirectStateStore {
    /// Create a store writing keys under `prefix`
    pub fn new(storage: SharedSessionStorage, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// Storage key prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Persist `state` under a fresh handshake id
    ///
    /// The write has completed when this returns, so a navigation issued
    /// afterwards cannot lose the record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage write fails.
    pub async fn begin_handshake<T>(&self, state: &T) -> Result<HandshakeId>
    where
        T: Serialize + Sync + ?Sized,
    {
        let payload = serde_json::to_string(state)?;
        let id = HandshakeId::generate();
        self.storage
            .set(&id.storage_key(&self.prefix), &payload)
            .await?;
        tracing::debug!(handshake_id = %id, prefix = %self.prefix, "Handshake state persisted");
        Ok(id)
    }

    /// Recover and consume the caller state for a callback URL
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HandshakeNotFound` if the URL has no id or no
    /// record exists (storage is left untouched), or a serialization error
    /// if the record does not decode as `T` (the record is kept).
    pub async fn complete_handshake<T: DeserializeOwned>(&self, callback_url: &str) -> Result<T> {
        let (id, payload) = self.read(callback_url).await?;
        let state = serde_json::from_str(&payload)?;
        self.storage.remove(&id.storage_key(&self.prefix)).await?;
        Ok(state)
    }

    /// Like [`complete_handshake`](Self::complete_handshake) but returns the stored text as-is
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HandshakeNotFound` if no record matches.
    pub async fn complete_handshake_raw(&self, callback_url: &str) -> Result<String> {
        let (id, payload) = self.read(callback_url).await?;
        self.storage.remove(&id.storage_key(&self.prefix)).await?;
        Ok(payload)
    }

    /// Remove the record for `id`; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn discard(&self, id: &HandshakeId) -> Result<bool> {
        let key = id.storage_key(&self.prefix);
        if self.storage.get(&key).await?.is_none() {
            return Ok(false);
        }
        self.storage.remove(&key).await?;
        Ok(true)
    }

    /// Remove the first record under this store's prefix, if any
    ///
    /// Not tied to a particular flow; used when a callback carries no
    /// usable handshake id. Returns the removed key.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn cleanup_any_handshake(&self) -> Result<Option<String>> {
        let namespace = format!("{}.", self.prefix);
        let keys = self.storage.keys().await?;
        let Some(key) = keys.into_iter().find(|k| k.starts_with(&namespace)) else {
            return Ok(None);
        };
        self.storage.remove(&key).await?;
        tracing::debug!(key = %key, "Removed leftover handshake record");
        Ok(Some(key))
    }

    async fn read(&self, callback_url: &str) -> Result<(HandshakeId, String)> {
        let id = handshake_id_from_callback(callback_url)
            .ok_or_else(|| AuthError::handshake_not_found(""))?;
        match self.storage.get(&id.storage_key(&self.prefix)).await? {
            Some(payload) => Ok((id, payload)),
            None => Err(AuthError::handshake_not_found(id.as_str())),
        }
    }
}

/// Last path segment of a callback URL, ignoring query and fragment
///
/// Accepts absolute URLs and root-relative paths. Returns `None` when the
/// last segment is empty (e.g. a trailing slash).
#[must_use]
pub fn handshake_id_from_callback(callback_url: &str) -> Option<HandshakeId> {
    let parsed = url::Url::parse(callback_url).or_else(|_| {
        url::Url::parse("http://localhost/").and_then(|base| base.join(callback_url))
    });
    let parsed = parsed.ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        None
    } else {
        Some(HandshakeId::new(segment))
    }
}

// ============================================================================
// In-memory session storage
// ============================================================================

/// Process-local [`SessionStorage`] with deterministic (sorted) key order
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemorySessionStorage {
    /// Create an empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the storage is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
