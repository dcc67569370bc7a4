use crate::{
    error::Result,
    models::session::SessionData,
    store::{decode_record, encode_record, Collection, Store},
};

const SESSION_KEY: &str = "session";

/// Loads the persisted (still encrypted) session, if any.
pub async fn get_session(store: &dyn Store) -> Result<Option<SessionData>> {
    store
        .get(Collection::Session, SESSION_KEY)
        .await?
        .map(|raw| decode_record(Collection::Session, &raw))
        .transpose()
}

/// Overwrites the persisted session.
pub async fn set_session(store: &dyn Store, session: &SessionData) -> Result<()> {
    store
        .put(Collection::Session, SESSION_KEY, encode_record(session)?)
        .await
}

/// Removes the persisted session.
pub async fn clear_session(store: &dyn Store) -> Result<()> {
    store.delete(Collection::Session, SESSION_KEY).await
}
