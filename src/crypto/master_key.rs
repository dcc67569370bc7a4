use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::crypto::aes::{self, SecureKey};
use crate::error::{AppError, Result};
use crate::store::{decode_record, encode_record, Collection, Store};

/// Identifier of the one key record this installation uses.
pub const MASTER_KEY_ID: &str = "master";

/// The persisted form of the master key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: String,
    /// base64 of the raw 32-byte AES key.
    pub key: String,
}

/// Keeps the imported master key in memory so the store is read once.
#[derive(Clone, Default)]
pub struct MasterKeyCache {
    cache: Arc<RwLock<Option<SecureKey>>>,
}

impl MasterKeyCache {
    /// Creates a new, empty `MasterKeyCache`.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<SecureKey> {
        self.cache.read().await.clone()
    }

    pub async fn insert(&self, key: SecureKey) {
        *self.cache.write().await = Some(key);
    }

    pub async fn clear(&self) {
        *self.cache.write().await = None;
    }
}

/// Returns the master key, creating and persisting one on first use.
///
/// Creation holds the cache's write lock and only writes the record when none exists,
/// so concurrent first callers, in this process or another, all end up with one key.
pub async fn get_master_key(store: &dyn Store, key_cache: &MasterKeyCache) -> Result<SecureKey> {
    if let Some(key) = key_cache.get().await {
        tracing::debug!("Master key retrieved from memory");
        return Ok(key);
    }

    let mut slot = key_cache.cache.write().await;
    if let Some(key) = slot.as_ref() {
        return Ok(key.clone());
    }

    if let Some(key) = load_master_key(store).await? {
        tracing::debug!("Master key imported from store");
        *slot = Some(key.clone());
        return Ok(key);
    }

    tracing::warn!("No master key found, generating a new one");

    let generated = aes::generate_key();
    let record = KeyRecord {
        id: MASTER_KEY_ID.to_string(),
        key: generated.export(),
    };
    let written = store
        .put_if_absent(Collection::CryptoKey, MASTER_KEY_ID, encode_record(&record)?)
        .await?;

    let key = if written {
        tracing::info!("Master key created and stored");
        generated
    } else {
        tracing::info!("Master key was created concurrently, using the stored one");
        load_master_key(store)
            .await?
            .ok_or_else(|| AppError::Cache("master key vanished after creation".to_string()))?
    };

    *slot = Some(key.clone());
    Ok(key)
}

async fn load_master_key(store: &dyn Store) -> Result<Option<SecureKey>> {
    match store.get(Collection::CryptoKey, MASTER_KEY_ID).await? {
        Some(raw) => {
            let record: KeyRecord = decode_record(Collection::CryptoKey, &raw)?;
            Ok(Some(SecureKey::import(&record.key)?))
        }
        None => Ok(None),
    }
}

/// Forgets the master key both in memory and in the store.
///
/// Anything encrypted under it becomes unreadable.
pub async fn clear_master_key(store: &dyn Store, key_cache: &MasterKeyCache) -> Result<()> {
    key_cache.clear().await;
    store.delete(Collection::CryptoKey, MASTER_KEY_ID).await
}
