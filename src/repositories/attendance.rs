use std::collections::BTreeMap;

use crate::{
    error::Result,
    models::attendance::AttendanceRecord,
    store::{decode_record, encode_record, Collection, Store},
};

/// Reads every attendance row and groups it by month tag.
///
/// Rows without a month tag are skipped.
pub async fn get_cached_attendance(
    store: &dyn Store,
) -> Result<BTreeMap<String, Vec<AttendanceRecord>>> {
    let mut by_month: BTreeMap<String, Vec<AttendanceRecord>> = BTreeMap::new();

    for raw in store.list_all(Collection::Attendance).await? {
        let record: AttendanceRecord = decode_record(Collection::Attendance, &raw)?;
        if let Some(month) = record.month.clone() {
            by_month.entry(month).or_default().push(record);
        }
    }

    Ok(by_month)
}

/// Attendance rows for one month tag (linear scan, there is no secondary index).
pub async fn get_attendance_by_month(store: &dyn Store, month: &str) -> Result<Vec<AttendanceRecord>> {
    Ok(get_cached_attendance(store)
        .await?
        .remove(month)
        .unwrap_or_default())
}

/// Makes `records` the whole set for `month`.
///
/// Subjects missing from `records` are dropped from that month; other months are untouched.
pub async fn upsert_attendance(
    store: &dyn Store,
    month: &str,
    records: &[AttendanceRecord],
) -> Result<()> {
    let entries = records
        .iter()
        .map(|record| {
            let tagged = AttendanceRecord {
                month: Some(month.to_string()),
                ..record.clone()
            };
            Ok((
                AttendanceRecord::cache_key(month, &record.subject),
                encode_record(&tagged)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    store
        .replace_prefixed(Collection::Attendance, &format!("{}:", month), entries)
        .await
}

pub async fn clear_attendance(store: &dyn Store) -> Result<()> {
    store.clear(Collection::Attendance).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(subject: &str, total: u32, attended: u32) -> AttendanceRecord {
        AttendanceRecord {
            subject: subject.to_string(),
            total_classes: total,
            attended_classes: attended,
            percentage: attended as f64 * 100.0 / total as f64,
            month: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_the_month_set() {
        let store = MemoryStore::new();
        upsert_attendance(&store, "current", &[record("Physics", 10, 9), record("Maths", 10, 5)])
            .await
            .unwrap();
        upsert_attendance(&store, "current", &[record("Physics", 12, 11)])
            .await
            .unwrap();

        let rows = get_attendance_by_month(&store, "current").await.unwrap();
        let subjects: Vec<&str> = rows.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Physics"]);
        assert_eq!(rows[0].total_classes, 12);
        assert_eq!(rows[0].month.as_deref(), Some("current"));
    }

    #[tokio::test]
    async fn test_grouping_by_month() {
        let store = MemoryStore::new();
        upsert_attendance(&store, "2024-01", &[record("Physics", 10, 9)]).await.unwrap();
        upsert_attendance(&store, "current", &[record("Physics", 4, 4)]).await.unwrap();

        let grouped = get_cached_attendance(&store).await.unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["2024-01"][0].total_classes, 10);

        upsert_attendance(&store, "current", &[record("Maths", 4, 2)]).await.unwrap();
        let grouped = get_cached_attendance(&store).await.unwrap();
        assert_eq!(grouped["2024-01"][0].subject, "Physics");
        assert_eq!(grouped["current"].len(), 1);
        assert_eq!(grouped["current"][0].subject, "Maths");
        assert!(get_attendance_by_month(&store, "2023-12").await.unwrap().is_empty());
    }
}
