//! Per-cluster video composition.
//!
//! One call to [`VideoComposer::compose`] turns a cluster into a stored
//! video: pick photos, narrate, prepare slides, encode, upload, record, and
//! when narration exists, merge it in and swap the record's URL. Narration
//! and merge failures degrade to a silent video; anything else fails the
//! call with the [`Stage`] it happened in. Local files live in a
//! [`ScratchSpace`] that is removed on every exit path.

mod scratch;
mod selection;

pub use scratch::ScratchSpace;
pub use selection::{seconds_per_image, select_photos};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{ClusterRepository, VideoRepository};
use crate::error::{MediaError, PipelineError, PipelineResult};
use crate::media::{prepare_slide, rgb_to_i420, I420Frame, Muxer, VideoEncoder};
use crate::model::{GeneratedVideoRecord, PhotoCluster, TriggerType};
use crate::narration;
use crate::speech::{Narration, Narrator};
use crate::storage::BlobStorage;

/// Named pipeline stages, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SelectPhotos,
    Narrate,
    PrepareFrames,
    Encode,
    Upload,
    Record,
    Download,
    Merge,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SelectPhotos => "select_photos",
            Stage::Narrate => "narrate",
            Stage::PrepareFrames => "prepare_frames",
            Stage::Encode => "encode",
            Stage::Upload => "upload",
            Stage::Record => "record",
            Stage::Download => "download",
            Stage::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces one video for one cluster.
#[async_trait]
pub trait VideoComposer: Send + Sync {
    async fn compose(
        &self,
        patient_id: &str,
        cluster: &PhotoCluster,
        trigger: TriggerType,
    ) -> PipelineResult<GeneratedVideoRecord>;
}

/// Limits and output parameters for composition.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub work_dir: PathBuf,
    pub max_photos: usize,
    pub min_seconds_per_image: u32,
    pub max_seconds_per_image: u32,
    pub default_seconds_per_image: u32,
    pub width: u32,
    pub height: u32,
    pub container: String,
    pub encode_timeout: Duration,
    pub merge_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let video = &config.video;
        Self {
            work_dir: config.work_dir.clone(),
            max_photos: video.max_photos,
            min_seconds_per_image: video.min_seconds_per_image,
            max_seconds_per_image: video.max_seconds_per_image,
            default_seconds_per_image: video.default_seconds_per_image,
            width: video.width,
            height: video.height,
            container: video.container.clone(),
            encode_timeout: Duration::from_secs(video.encode_timeout_secs),
            merge_timeout: Duration::from_secs(video.merge_timeout_secs),
            transfer_timeout: Duration::from_secs(config.storage.transfer_timeout_secs),
        }
    }
}

/// Local path for a photo URI. Plain paths and `file://` URLs are supported.
pub fn photo_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

/// Await `fut` for at most `limit`, attributing both failure kinds to `stage`.
async fn staged<T, E, F>(
    stage: Stage,
    limit: Duration,
    fut: F,
    wrap: impl FnOnce(Stage, E) -> PipelineError,
) -> PipelineResult<T>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(wrap(stage, e)),
        Err(_) => Err(PipelineError::Timeout {
            stage,
            secs: limit.as_secs(),
        }),
    }
}

fn media_err(stage: Stage, source: MediaError) -> PipelineError {
    PipelineError::Media { stage, source }
}

fn storage_err(stage: Stage, source: crate::error::StorageError) -> PipelineError {
    PipelineError::Storage { stage, source }
}

fn log_progress(done: u64, total: u64) {
    trace!("Transferred {}/{} bytes", done, total);
}

pub struct CompositionPipeline {
    clusters: ClusterRepository,
    videos: VideoRepository,
    storage: Arc<dyn BlobStorage>,
    narrator: Arc<Narrator>,
    encoder: Arc<dyn VideoEncoder>,
    muxer: Arc<dyn Muxer>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
    rng: Mutex<StdRng>,
}

impl CompositionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clusters: ClusterRepository,
        videos: VideoRepository,
        storage: Arc<dyn BlobStorage>,
        narrator: Arc<Narrator>,
        encoder: Arc<dyn VideoEncoder>,
        muxer: Arc<dyn Muxer>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            clusters,
            videos,
            storage,
            narrator,
            encoder,
            muxer,
            clock,
            settings,
            rng: Mutex::new(rng),
        }
    }

    fn choose_photos(&self, cluster: &PhotoCluster) -> Vec<crate::model::PhotoRecord> {
        match self.rng.lock() {
            Ok(mut rng) => select_photos(&cluster.photos, self.settings.max_photos, &mut *rng),
            Err(poisoned) => select_photos(&cluster.photos, self.settings.max_photos, &mut *poisoned.into_inner()),
        }
    }

    async fn narrate(&self, script: &str, output: &Path) -> Option<Narration> {
        match self.narrator.narrate(script, output).await {
            Ok(narration) => Some(narration),
            Err(e) => {
                warn!("Narration unavailable, producing a silent video: {}", e);
                None
            }
        }
    }

    /// Decode and convert photos in parallel, skipping any that fail.
    async fn prepare_frames(&self, paths: Vec<PathBuf>) -> PipelineResult<Vec<I420Frame>> {
        let attempted = paths.len();
        let (width, height) = (self.settings.width, self.settings.height);

        let results = tokio::task::spawn_blocking(move || {
            paths
                .par_iter()
                .map(|path| {
                    prepare_slide(path, width, height)
                        .map(|img| rgb_to_i420(&img))
                        .map_err(|e| (path.clone(), e))
                })
                .collect::<Vec<_>>()
        })
        .await?;

        let mut frames = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(frame) => frames.push(frame),
                Err((path, e)) => warn!("Skipping photo {}: {}", path.display(), e),
            }
        }

        if frames.is_empty() {
            return Err(PipelineError::NoLoadablePhotos { attempted });
        }
        Ok(frames)
    }

    async fn upload(&self, local: &Path, key: &str) -> PipelineResult<String> {
        staged(
            Stage::Upload,
            self.settings.transfer_timeout,
            self.storage.upload(local, key, &log_progress),
            storage_err,
        )
        .await
    }

    /// Round-trip the silent upload, add the narration track, and upload the
    /// result. Returns the merged URL.
    async fn merge_narration(
        &self,
        scratch: &ScratchSpace,
        silent_url: &str,
        narration: &Narration,
        key: &str,
    ) -> PipelineResult<String> {
        let ext = &self.settings.container;
        let downloaded = scratch.file(&format!("downloaded.{}", ext));
        staged(
            Stage::Download,
            self.settings.transfer_timeout,
            self.storage.download(silent_url, &downloaded, &log_progress),
            storage_err,
        )
        .await?;

        let merged = scratch.file(&format!("merged.{}", ext));
        staged(
            Stage::Merge,
            self.settings.merge_timeout,
            self.muxer.mux(&downloaded, &narration.audio_path, &merged),
            media_err,
        )
        .await?;

        self.upload(&merged, key).await
    }

    async fn run(
        &self,
        patient_id: &str,
        cluster: &PhotoCluster,
        trigger: TriggerType,
    ) -> PipelineResult<GeneratedVideoRecord> {
        let selected = self.choose_photos(cluster);
        if selected.is_empty() {
            return Err(PipelineError::EmptyCluster(cluster.id.clone()));
        }

        let scratch = ScratchSpace::create(&self.settings.work_dir)
            .map_err(|e| media_err(Stage::SelectPhotos, MediaError::Io(e)))?;

        let script = narration::script_for(cluster, selected.len());
        debug!("Narration script for {}: {}", cluster.id, script);
        let narration = self.narrate(&script, &scratch.file("narration.wav")).await;

        let paths = selected.iter().map(|p| photo_path(&p.uri)).collect();
        let frames = self.prepare_frames(paths).await?;

        // Spread the narration over the slides that actually loaded
        let seconds = seconds_per_image(
            narration.as_ref().map(|n| n.duration_secs),
            frames.len(),
            self.settings.min_seconds_per_image,
            self.settings.max_seconds_per_image,
            self.settings.default_seconds_per_image,
        );

        let ext = &self.settings.container;
        let silent_path = scratch.file(&format!("silent.{}", ext));
        let encoded = staged(
            Stage::Encode,
            self.settings.encode_timeout,
            self.encoder.encode(&frames, seconds, &silent_path),
            media_err,
        )
        .await?;
        // Frames are large; release them before the network stages
        let photo_count = frames.len();
        drop(frames);

        // Keys carry the record id so a cluster can be used again on a later day
        let record_id = Uuid::new_v4().to_string();
        let blob_prefix = format!("videos/{}/{}/{}", patient_id, cluster.id, record_id);
        let silent_key = format!("{}_silent.{}", blob_prefix, ext);
        let silent_url = self.upload(&encoded.path, &silent_key).await?;

        let mut record = GeneratedVideoRecord {
            id: record_id,
            patient_id: patient_id.to_string(),
            cluster_id: cluster.id.clone(),
            video_url: silent_url.clone(),
            trigger,
            created_at: self.clock.now_millis(),
            duration_secs: encoded.duration_secs(),
            photo_count,
            has_narration: false,
        };
        self.videos
            .create(&record)
            .await
            .map_err(|source| PipelineError::Store {
                stage: Stage::Record,
                source,
            })?;

        if let Some(narration) = &narration {
            let key = format!("{}.{}", blob_prefix, ext);
            match self.merge_narration(&scratch, &silent_url, narration, &key).await {
                Ok(url) => match self.videos.patch_video_url(&record.id, &url, true).await {
                    Ok(()) => {
                        record.video_url = url;
                        record.has_narration = true;
                        if let Err(e) = self.storage.delete(&silent_url).await {
                            debug!("Could not remove silent upload {}: {}", silent_url, e);
                        }
                    }
                    Err(e) => warn!("Merged video uploaded but record not updated, keeping silent URL: {}", e),
                },
                Err(e) => warn!("Keeping silent video for cluster {}: {}", cluster.id, e),
            }
        }

        if let Err(e) = self
            .clusters
            .mark_video_generated(patient_id, &cluster.id, record.created_at)
            .await
        {
            warn!("Failed to flag cluster {} as used: {}", cluster.id, e);
        }

        Ok(record)
    }
}

#[async_trait]
impl VideoComposer for CompositionPipeline {
    async fn compose(
        &self,
        patient_id: &str,
        cluster: &PhotoCluster,
        trigger: TriggerType,
    ) -> PipelineResult<GeneratedVideoRecord> {
        let started = std::time::Instant::now();
        let record = self.run(patient_id, cluster, trigger).await?;
        info!(
            "Composed {} video for cluster {} ({} photos, {}s, narrated: {}) in {:.1}s",
            trigger,
            cluster.id,
            record.photo_count,
            record.duration_secs,
            record.has_narration,
            started.elapsed().as_secs_f64()
        );
        Ok(record)
    }
}
