use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable, fully recomputed copy of a session's observable fields.
///
/// This is the persisted record shape. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: i64,
    pub is_active: bool,
    pub is_paused: bool,
    pub paused_duration: i64,
    pub files_worked_on: Vec<String>,
    pub keystrokes: u64,
    pub active_time: i64,
    pub flow_state_detected: bool,
    pub flow_state_duration: i64,
    pub interruptions: u32,
}
