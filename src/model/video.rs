//! Generated video records and generation failure log entries.

use serde::{Deserialize, Serialize};

/// The event that caused a generation batch, as recorded on each video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Signup,
    LoginSupplement,
    Background,
    DailyMidnight,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Signup => "signup",
            TriggerType::LoginSupplement => "login_supplement",
            TriggerType::Background => "background",
            TriggerType::DailyMidnight => "daily_midnight",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(TriggerType::Signup),
            "login_supplement" => Some(TriggerType::LoginSupplement),
            "background" => Some(TriggerType::Background),
            "daily_midnight" => Some(TriggerType::DailyMidnight),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed video. Append-only apart from the merged-URL patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedVideoRecord {
    pub id: String,
    pub patient_id: String,
    pub cluster_id: String,
    pub video_url: String,
    pub trigger: TriggerType,
    pub created_at: i64,
    pub duration_secs: u32,
    pub photo_count: usize,
    #[serde(default)]
    pub has_narration: bool,
}

/// Failure log entry for a batch item that could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub patient_id: String,
    pub cluster_id: String,
    pub trigger: TriggerType,
    pub stage: String,
    pub error: String,
    pub failed_at: i64,
}
