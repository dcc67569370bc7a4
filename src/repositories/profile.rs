use crate::{
    error::Result,
    models::profile::StudentProfile,
    store::{decode_record, encode_record, Collection, Store},
};

const PROFILE_KEY: &str = "student";

pub async fn get_cached_profile(store: &dyn Store) -> Result<Option<StudentProfile>> {
    store
        .get(Collection::Profile, PROFILE_KEY)
        .await?
        .map(|raw| decode_record(Collection::Profile, &raw))
        .transpose()
}

pub async fn set_cached_profile(store: &dyn Store, profile: &StudentProfile) -> Result<()> {
    store
        .put(Collection::Profile, PROFILE_KEY, encode_record(profile)?)
        .await
}

pub async fn clear_profile(store: &dyn Store) -> Result<()> {
    store.delete(Collection::Profile, PROFILE_KEY).await
}
