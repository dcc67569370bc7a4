use serde::{Deserialize, Serialize};

/// Month tag used for the attendance the portal reports for the running month.
pub const CURRENT_MONTH: &str = "current";

/// One subject's attendance for one month.
///
/// `attended_classes <= total_classes` is what the portal reports; it is not
/// re-checked here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub subject: String,
    pub total_classes: u32,
    pub attended_classes: u32,
    /// Portal-computed, 0 to 100.
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

impl AttendanceRecord {
    /// Cache key: `month:subject`.
    pub fn cache_key(month: &str, subject: &str) -> String {
        format!("{}:{}", month, subject)
    }
}
