//! Photo clusters: photos sharing a place and a contiguous time window.

use chrono::{DateTime, Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};

use super::photo::{PhotoRecord, TimeOfDay};
use crate::geo::GeoPoint;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// A group of photos taken close together in space and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoCluster {
    pub id: String,
    /// Location of the first member photo, not a centroid.
    pub location: Option<GeoPoint>,
    pub start_time: i64,
    pub end_time: i64,
    pub location_name: Option<String>,
    pub time_description: String,
    pub photos: Vec<PhotoRecord>,
}

impl PhotoCluster {
    /// Build a cluster from its members, stamping each photo with the id.
    ///
    /// Members are expected in capture order; the first one supplies the
    /// nominal location.
    pub fn from_members(id: String, mut photos: Vec<PhotoRecord>) -> Self {
        for photo in &mut photos {
            photo.cluster_id = Some(id.clone());
        }

        let location = photos.first().and_then(|p| p.location);
        let start_time = photos.iter().map(|p| p.captured_at_millis).min().unwrap_or(0);
        let end_time = photos.iter().map(|p| p.captured_at_millis).max().unwrap_or(0);
        let time_description = describe_time_range(start_time, end_time);

        Self {
            id,
            location,
            start_time,
            end_time,
            location_name: None,
            time_description,
            photos,
        }
    }

    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    /// True when the cluster has a usable, non-zero location.
    pub fn has_location(&self) -> bool {
        self.location.map(|p| !p.is_null_island()).unwrap_or(false)
    }

    /// Resolved place name, or the unknown-location placeholder.
    pub fn display_location(&self) -> &str {
        self.location_name.as_deref().unwrap_or(UNKNOWN_LOCATION)
    }

    /// Time-of-day bucket of the cluster's first photo.
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_millis(self.start_time)
    }
}

/// Human-readable description of a capture time range, local time.
pub fn describe_time_range(start_millis: i64, end_millis: i64) -> String {
    let (Some(start), Some(end)) = (local_time(start_millis), local_time(end_millis)) else {
        return String::new();
    };

    if start.date_naive() == end.date_naive() {
        format!(
            "{} {}, {} {}",
            start.format("%B"),
            start.day(),
            start.year(),
            TimeOfDay::from_millis(start_millis).phrase()
        )
    } else if start.year() == end.year() {
        format!(
            "{} {} to {} {}, {}",
            start.format("%B"),
            start.day(),
            end.format("%B"),
            end.day(),
            end.year()
        )
    } else {
        format!(
            "{} {}, {} to {} {}, {}",
            start.format("%B"),
            start.day(),
            start.year(),
            end.format("%B"),
            end.day(),
            end.year()
        )
    }
}

fn local_time(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local_millis(y: i32, m: u32, d: u32, h: u32) -> i64 {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap().timestamp_millis()
    }

    #[test]
    fn test_from_members_stamps_cluster_id() {
        let photos = vec![
            PhotoRecord::new("a", 1_000, Some(GeoPoint::new(1.0, 1.0))),
            PhotoRecord::new("b", 5_000, Some(GeoPoint::new(2.0, 2.0))),
        ];
        let cluster = PhotoCluster::from_members("loc_time".to_string(), photos);

        assert_eq!(cluster.photo_count(), 2);
        assert!(cluster
            .photos
            .iter()
            .all(|p| p.cluster_id.as_deref() == Some("loc_time")));
        assert_eq!(cluster.location, Some(GeoPoint::new(1.0, 1.0)));
        assert_eq!(cluster.start_time, 1_000);
        assert_eq!(cluster.end_time, 5_000);
    }

    #[test]
    fn test_cluster_without_location() {
        let cluster = PhotoCluster::from_members("x".to_string(), vec![PhotoRecord::new("a", 0, None)]);
        assert!(!cluster.has_location());
        assert_eq!(cluster.display_location(), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_describe_same_day() {
        let start = local_millis(2024, 3, 5, 14);
        let end = local_millis(2024, 3, 5, 16);
        assert_eq!(describe_time_range(start, end), "March 5, 2024 in the afternoon");
    }

    #[test]
    fn test_describe_multi_day() {
        let start = local_millis(2024, 3, 5, 9);
        let end = local_millis(2024, 3, 7, 9);
        assert_eq!(describe_time_range(start, end), "March 5 to March 7, 2024");

        let end = local_millis(2025, 1, 2, 9);
        assert_eq!(
            describe_time_range(start, end),
            "March 5, 2024 to January 2, 2025"
        );
    }
}
