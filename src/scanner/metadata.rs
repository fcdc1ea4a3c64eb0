use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::geo::GeoPoint;

/// Capture details read from a photo file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    /// Epoch milliseconds from EXIF `DateTimeOriginal`, in local time.
    pub taken_at_millis: Option<i64>,
    pub location: Option<GeoPoint>,
}

pub fn extract_metadata(path: &Path) -> Result<CaptureMetadata> {
    let mut metadata = CaptureMetadata::default();

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut bufreader = BufReader::new(file);

    // Files without EXIF are normal; leave both fields empty
    let exif = match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => exif,
        Err(_) => return Ok(metadata),
    };

    let date_field = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY));
    if let Some(field) = date_field {
        if let exif::Value::Ascii(ref values) = field.value {
            metadata.taken_at_millis = values.first().and_then(|raw| parse_exif_datetime(raw));
        }
    }

    if let (Some(lat_field), Some(lat_ref), Some(lon_field), Some(lon_ref)) = (
        exif.get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLatitudeRef, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLongitudeRef, exif::In::PRIMARY),
    ) {
        if let (Some(lat), Some(lon)) = (rational_dms(&lat_field.value), rational_dms(&lon_field.value)) {
            let lat_ref_str = lat_ref.display_value().to_string();
            let lon_ref_str = lon_ref.display_value().to_string();

            let latitude = if lat_ref_str.contains('S') { -lat } else { lat };
            let longitude = if lon_ref_str.contains('W') { -lon } else { lon };

            // Some cameras write 0/0 when they never got a fix
            if latitude.is_finite() && longitude.is_finite() && (latitude, longitude) != (0.0, 0.0) {
                metadata.location = Some(GeoPoint::new(latitude, longitude));
            }
        }
    }

    Ok(metadata)
}

fn rational_dms(value: &exif::Value) -> Option<f64> {
    match value {
        exif::Value::Rational(parts) if parts.len() >= 3 => Some(dms_to_decimal(
            parts[0].to_f64(),
            parts[1].to_f64(),
            parts[2].to_f64(),
        )),
        _ => None,
    }
}

pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` stamp as local time.
pub fn parse_exif_datetime(raw: &[u8]) -> Option<i64> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.timestamp_millis())
}

/// File modification time in epoch milliseconds.
pub fn modified_millis(path: &Path) -> Result<i64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", path.display()))?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .context("Modification time before 1970")?;
    Ok(since_epoch.as_millis() as i64)
}
