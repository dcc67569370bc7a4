use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::timetable::{day_index, TimetableEntry},
};

#[derive(Debug, Deserialize)]
struct TimetablePayload {
    #[serde(rename = "TimeTableChildsList")]
    children: Option<Vec<TimetableChild>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TimetableChild {
    time_table_day_master_id: Option<i64>,
    time_table_hour_master_id: Option<i64>,
    subject_name: Option<String>,
}

/// The portal numbers days from Tuesday; Monday is 6.
fn day_name(day_id: i64) -> Option<&'static str> {
    match day_id {
        6 => Some("Monday"),
        1 => Some("Tuesday"),
        2 => Some("Wednesday"),
        3 => Some("Thursday"),
        4 => Some("Friday"),
        5 => Some("Saturday"),
        _ => None,
    }
}

/// Course codes follow the subject name after a dash.
fn subject_name(full: &str) -> &str {
    full.split('-').next().unwrap_or("").trim()
}

fn decode_timetable(body: &str) -> Result<Vec<TimetableEntry>> {
    let payload: TimetablePayload = sonic_rs::from_str(body)
        .map_err(|e| AppError::Parse(format!("timetable payload: {}", e)))?;
    let children = payload
        .children
        .ok_or_else(|| AppError::Parse("timetable payload has no TimeTableChildsList".into()))?;

    let entries = children
        .into_iter()
        .filter_map(|child| {
            let day_id = child.time_table_day_master_id?;
            let Some(day) = day_name(day_id) else {
                tracing::debug!("Dropping timetable entry with unknown day id {}", day_id);
                return None;
            };
            let subject = subject_name(child.subject_name.as_deref().unwrap_or(""));
            if subject.is_empty() {
                return None;
            }
            let hour_id = child.time_table_hour_master_id;
            let Some(period) = hour_id.and_then(|id| u32::try_from(id).ok()).filter(|p| *p > 0) else {
                tracing::debug!("Dropping timetable entry with hour id {:?}", hour_id);
                return None;
            };
            Some(TimetableEntry {
                day: day.to_string(),
                period,
                subject: subject.to_string(),
                ..TimetableEntry::default()
            })
        })
        .collect();

    Ok(resolve_collisions(entries))
}

/// Gives every entry of a day its own period.
///
/// Groups sharing a reported period are taken in ascending period order; each
/// entry gets the first free period at or after its group's period. Entries keep
/// their original relative order within a group. Entries pushed past `u32::MAX`
/// are dropped.
pub fn resolve_collisions(entries: Vec<TimetableEntry>) -> Vec<TimetableEntry> {
    let mut by_day: BTreeMap<usize, BTreeMap<u32, Vec<TimetableEntry>>> = BTreeMap::new();
    for entry in entries {
        by_day
            .entry(day_index(&entry.day))
            .or_default()
            .entry(entry.period)
            .or_default()
            .push(entry);
    }

    let mut resolved = Vec::new();
    for groups in by_day.into_values() {
        let mut next_free = Some(0u32);
        for (period, group) in groups {
            for mut entry in group {
                let Some(free) = next_free else {
                    tracing::debug!("No period left on {} for {}", entry.day, entry.subject);
                    continue;
                };
                let slot = period.max(free);
                next_free = slot.checked_add(1);
                entry.period = slot;
                resolved.push(entry);
            }
        }
    }
    resolved
}

/// Reads the weekly timetable. Never fails; HTML or empty bodies yield nothing.
pub fn parse_timetable(body: &str) -> Vec<TimetableEntry> {
    if body.trim().is_empty() {
        tracing::warn!("Timetable response is empty");
        return Vec::new();
    }
    if body.contains("<!DOCTYPE") || body.contains("<html") {
        tracing::warn!("Timetable endpoint returned HTML instead of JSON");
        return Vec::new();
    }

    match decode_timetable(body) {
        Ok(entries) => {
            tracing::info!("Parsed {} timetable entries", entries.len());
            entries
        }
        Err(e) => {
            tracing::warn!("Discarding timetable payload: {}", e);
            Vec::new()
        }
    }
}
