use crate::{
    error::Result,
    models::timetable::{day_index, TimetableEntry},
    store::{decode_record, encode_record, Collection, Store},
};

/// The cached timetable ordered by day, then period.
pub async fn get_cached_timetable(store: &dyn Store) -> Result<Vec<TimetableEntry>> {
    let mut entries = store
        .list_all(Collection::Timetable)
        .await?
        .iter()
        .map(|raw| decode_record::<TimetableEntry>(Collection::Timetable, raw))
        .collect::<Result<Vec<_>>>()?;

    entries.sort_by(|a, b| {
        day_index(&a.day)
            .cmp(&day_index(&b.day))
            .then(a.period.cmp(&b.period))
    });
    Ok(entries)
}

/// Replaces the whole timetable. Period numbers are derived, so old keys never carry over.
pub async fn replace_timetable(store: &dyn Store, entries: &[TimetableEntry]) -> Result<()> {
    let records = entries
        .iter()
        .map(|entry| Ok((entry.cache_key(), encode_record(entry)?)))
        .collect::<Result<Vec<_>>>()?;

    store.replace_all(Collection::Timetable, records).await
}

pub async fn clear_timetable(store: &dyn Store) -> Result<()> {
    store.clear(Collection::Timetable).await
}
