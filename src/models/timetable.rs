use serde::{Deserialize, Serialize};

/// Teaching days in display order.
pub const DAYS: [&str; 6] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Position of `day` in [`DAYS`], unknown days sorting last.
pub fn day_index(day: &str) -> usize {
    DAYS.iter().position(|d| *d == day).unwrap_or(DAYS.len())
}

/// One slot of the weekly timetable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub day: String,
    pub period: u32,
    pub subject: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl TimetableEntry {
    /// Cache key: `day:period`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.day, self.period)
    }
}
