use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};

/// Prefix of every Redis hash owned by the cache.
const REDIS_NAMESPACE: &str = "shc_attend";

/// The named collections of the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Session,
    Profile,
    Attendance,
    Timetable,
    SyncMeta,
    CryptoKey,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Session,
        Collection::Profile,
        Collection::Attendance,
        Collection::Timetable,
        Collection::SyncMeta,
        Collection::CryptoKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Session => "session",
            Collection::Profile => "profile",
            Collection::Attendance => "attendance",
            Collection::Timetable => "timetable",
            Collection::SyncMeta => "sync_meta",
            Collection::CryptoKey => "crypto_key",
        }
    }
}

/// A key→value map per collection. Values are opaque serialized records.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<String>>;

    async fn put(&self, collection: Collection, key: &str, value: String) -> Result<()>;

    async fn delete(&self, collection: Collection, key: &str) -> Result<()>;

    async fn clear(&self, collection: Collection) -> Result<()>;

    async fn list_all(&self, collection: Collection) -> Result<Vec<String>>;

    /// Atomically swaps the whole collection for `entries`.
    async fn replace_all(&self, collection: Collection, entries: Vec<(String, String)>) -> Result<()>;

    /// Atomically swaps every key starting with `prefix` for `entries`, leaving other keys alone.
    async fn replace_prefixed(
        &self,
        collection: Collection,
        prefix: &str,
        entries: Vec<(String, String)>,
    ) -> Result<()>;

    /// Writes `value` only when `key` is unused. Returns whether it was written.
    async fn put_if_absent(&self, collection: Collection, key: &str, value: String) -> Result<bool>;
}

/// The cache handle shared by every component.
pub type Cache = Arc<dyn Store>;

/// Serializes a record for storage.
pub fn encode_record<T: serde::Serialize>(record: &T) -> Result<String> {
    sonic_rs::to_string(record)
        .map_err(|e| AppError::Internal(format!("Record serialization failed: {}", e)))
}

/// Reads a stored record back. A record that no longer decodes means the cache is corrupt.
pub fn decode_record<T: serde::de::DeserializeOwned>(collection: Collection, raw: &str) -> Result<T> {
    sonic_rs::from_str(raw).map_err(|e| {
        AppError::Cache(format!("Corrupt record in {}: {}", collection.as_str(), e))
    })
}

/// A cache that lives only as long as the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Collection, BTreeMap<String, String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, collection: Collection, key: &str, value: String) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(entries) = collections.get_mut(&collection) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(&collection);
        Ok(())
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace_all(&self, collection: Collection, entries: Vec<(String, String)>) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.insert(collection, entries.into_iter().collect());
        Ok(())
    }

    async fn replace_prefixed(
        &self,
        collection: Collection,
        prefix: &str,
        entries: Vec<(String, String)>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let current = collections.entry(collection).or_default();
        current.retain(|key, _| !key.starts_with(prefix));
        current.extend(entries);
        Ok(())
    }

    async fn put_if_absent(&self, collection: Collection, key: &str, value: String) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let current = collections.entry(collection).or_default();
        if current.contains_key(key) {
            return Ok(false);
        }
        current.insert(key.to_string(), value);
        Ok(true)
    }
}

/// A cache persisted in Redis, one hash per collection.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    /// Connects to Redis and returns a pooled store.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }

    fn hash_key(collection: Collection) -> String {
        format!("{}:{}", REDIS_NAMESPACE, collection.as_str())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<String>> {
        let mut redis = self.redis.clone();
        let value: Option<String> = redis.hget(Self::hash_key(collection), key).await?;
        Ok(value)
    }

    async fn put(&self, collection: Collection, key: &str, value: String) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.hset(Self::hash_key(collection), key, value).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.hdel(Self::hash_key(collection), key).await?;
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(Self::hash_key(collection)).await?;
        Ok(())
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<String>> {
        let mut redis = self.redis.clone();
        let values: Vec<String> = redis.hvals(Self::hash_key(collection)).await?;
        Ok(values)
    }

    async fn replace_all(&self, collection: Collection, entries: Vec<(String, String)>) -> Result<()> {
        let mut redis = self.redis.clone();
        let hash_key = Self::hash_key(collection);

        let mut pipe = redis::pipe();
        pipe.atomic().del(&hash_key).ignore();
        if !entries.is_empty() {
            pipe.hset_multiple(&hash_key, &entries).ignore();
        }
        let _: () = pipe.query_async(&mut redis).await?;
        Ok(())
    }

    async fn replace_prefixed(
        &self,
        collection: Collection,
        prefix: &str,
        entries: Vec<(String, String)>,
    ) -> Result<()> {
        let mut redis = self.redis.clone();
        let hash_key = Self::hash_key(collection);

        let keys: Vec<String> = redis.hkeys(&hash_key).await?;
        let stale: Vec<&String> = keys
            .iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| !entries.iter().any(|(new_key, _)| new_key == *key))
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic();
        if !stale.is_empty() {
            pipe.hdel(&hash_key, stale).ignore();
        }
        if !entries.is_empty() {
            pipe.hset_multiple(&hash_key, &entries).ignore();
        }
        let _: () = pipe.query_async(&mut redis).await?;
        Ok(())
    }

    async fn put_if_absent(&self, collection: Collection, key: &str, value: String) -> Result<bool> {
        let mut redis = self.redis.clone();
        let written: bool = redis.hset_nx(Self::hash_key(collection), key, value).await?;
        Ok(written)
    }
}
