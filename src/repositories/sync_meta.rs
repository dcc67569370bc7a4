use crate::{
    error::Result,
    models::sync::SyncMeta,
    store::{decode_record, encode_record, Collection, Store},
};

const SYNC_META_KEY: &str = "lastSync";

pub async fn get_sync_meta(store: &dyn Store) -> Result<Option<SyncMeta>> {
    store
        .get(Collection::SyncMeta, SYNC_META_KEY)
        .await?
        .map(|raw| decode_record(Collection::SyncMeta, &raw))
        .transpose()
}

/// Timestamp (ms) of the last completed sync.
pub async fn get_last_sync_time(store: &dyn Store) -> Result<Option<i64>> {
    Ok(get_sync_meta(store).await?.map(|meta| meta.timestamp))
}

pub async fn set_sync_meta(store: &dyn Store, meta: &SyncMeta) -> Result<()> {
    store
        .put(Collection::SyncMeta, SYNC_META_KEY, encode_record(meta)?)
        .await
}

pub async fn clear_sync_meta(store: &dyn Store) -> Result<()> {
    store.delete(Collection::SyncMeta, SYNC_META_KEY).await
}
