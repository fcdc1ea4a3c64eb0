//! Local photo metadata source.
//!
//! Walks the library directory and turns every image into a [`PhotoRecord`]
//! with its capture time and, when EXIF carries one, a GPS location.

pub mod discovery;
pub mod metadata;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::LibraryConfig;
use crate::model::PhotoRecord;

pub use discovery::discover_images;
pub use metadata::{extract_metadata, CaptureMetadata};

/// Where photo records come from.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn list_photos(&self) -> Result<Vec<PhotoRecord>>;
}

/// Counts from a single pass over the library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub discovered: usize,
    pub with_exif_time: usize,
    pub with_location: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct LocalPhotoSource {
    directory: PathBuf,
    extensions: Vec<String>,
}

impl LocalPhotoSource {
    pub fn new(directory: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            extensions,
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(config.photo_dir.clone(), config.image_extensions.clone())
    }

    /// Scan synchronously. Unreadable files are skipped and counted.
    pub fn scan(&self) -> Result<(Vec<PhotoRecord>, ScanResult)> {
        let paths = discover_images(&self.directory, &self.extensions)?;
        info!("Found {} images under {:?}", paths.len(), self.directory);

        let scanned: Vec<Option<(PhotoRecord, bool)>> = paths
            .par_iter()
            .map(|path| match scan_single_file(path) {
                Ok(scanned) => Some(scanned),
                Err(e) => {
                    warn!("Skipping {:?}: {:#}", path, e);
                    None
                }
            })
            .collect();

        let mut result = ScanResult {
            discovered: paths.len(),
            ..ScanResult::default()
        };
        let mut photos = Vec::with_capacity(scanned.len());
        for entry in scanned {
            match entry {
                Some((photo, exif_time)) => {
                    if exif_time {
                        result.with_exif_time += 1;
                    }
                    if photo.has_location() {
                        result.with_location += 1;
                    }
                    photos.push(photo);
                }
                None => result.skipped += 1,
            }
        }

        info!(
            "Scan complete: {} photos, {} with EXIF time, {} with location, {} skipped",
            photos.len(),
            result.with_exif_time,
            result.with_location,
            result.skipped
        );
        Ok((photos, result))
    }
}

/// Record for one file, and whether its time came from EXIF.
fn scan_single_file(path: &Path) -> Result<(PhotoRecord, bool)> {
    let metadata = extract_metadata(path)?;
    let (captured_at, exif_time) = match metadata.taken_at_millis {
        Some(millis) => (millis, true),
        None => (metadata::modified_millis(path)?, false),
    };
    debug!("{:?} captured at {}", path, captured_at);

    let uri = path.to_string_lossy().to_string();
    Ok((PhotoRecord::new(uri, captured_at, metadata.location), exif_time))
}

#[async_trait]
impl PhotoSource for LocalPhotoSource {
    async fn list_photos(&self) -> Result<Vec<PhotoRecord>> {
        let source = self.clone();
        let (photos, _) = tokio::task::spawn_blocking(move || source.scan())
            .await
            .context("Photo scan task failed")??;
        Ok(photos)
    }
}
