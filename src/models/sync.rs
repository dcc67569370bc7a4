use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    attendance::AttendanceRecord, profile::StudentProfile, timetable::TimetableEntry,
};

/// Bookkeeping about the last completed sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub months_fetched: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_last_fetched: Option<i64>,
}

/// States of the sync state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
    AuthRequired,
}

/// Step counter shown while a sync runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncProgress {
    pub current: u32,
    pub total: u32,
}

/// What callers see of the orchestrator at any moment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub error: Option<String>,
    pub progress: Option<SyncProgress>,
    pub last_synced: Option<DateTime<Utc>>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            error: None,
            progress: None,
            last_synced: None,
        }
    }
}

/// Result of one `sync` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub profile_refreshed: bool,
    pub attendance_count: usize,
    pub timetable_count: usize,
}

impl SyncReport {
    pub fn failed(status: SyncStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            profile_refreshed: false,
            attendance_count: 0,
            timetable_count: 0,
        }
    }
}

/// Everything the cache holds for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedData {
    pub profile: Option<StudentProfile>,
    pub attendance: BTreeMap<String, Vec<AttendanceRecord>>,
    pub timetable: Vec<TimetableEntry>,
    pub sync_meta: Option<SyncMeta>,
}
