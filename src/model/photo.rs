//! Photo records produced by the metadata source.

use chrono::{Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Coarse part of the day a photo was taken in, local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// Bucket for an epoch-millisecond timestamp in the local timezone.
    pub fn from_millis(millis: i64) -> Self {
        match Local.timestamp_millis_opt(millis).single() {
            Some(dt) => Self::from_hour(dt.hour()),
            None => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
            TimeOfDay::Night => "Night",
        }
    }

    /// Lowercase phrase for narration ("in the morning", "at night").
    pub fn phrase(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "in the morning",
            TimeOfDay::Afternoon => "in the afternoon",
            TimeOfDay::Evening => "in the evening",
            TimeOfDay::Night => "at night",
        }
    }
}

/// A single photo as reported by the metadata source.
///
/// Everything except `cluster_id` is fixed at scan time; clustering stamps
/// `cluster_id` once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub uri: String,
    pub captured_at_millis: i64,
    pub location: Option<GeoPoint>,
    pub time_of_day: TimeOfDay,
    pub cluster_id: Option<String>,
}

impl PhotoRecord {
    pub fn new(uri: impl Into<String>, captured_at_millis: i64, location: Option<GeoPoint>) -> Self {
        Self {
            uri: uri.into(),
            captured_at_millis,
            location,
            time_of_day: TimeOfDay::from_millis(captured_at_millis),
            cluster_id: None,
        }
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }
}
