//! Wiring of the concrete collaborators from configuration.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::clock::{Clock, SystemClock};
use crate::clustering::ClusterEngine;
use crate::config::{Config, GeocoderConfig};
use crate::db::{
    daily_state_doc, ClusterRepository, ClusterSummary, DailyStateRepository, DocumentStore, SqliteStore,
    VideoRepository,
};
use crate::geocode::{CachedGeocoder, CoordinateGeocoder, Geocoder, NominatimGeocoder};
use crate::media::{find_ffmpeg, EncodeSettings, FfmpegEncoder, FfmpegMuxer};
use crate::model::{DailyGenerationState, GeneratedVideoRecord, GenerationFailure};
use crate::pipeline::{CompositionPipeline, PipelineSettings};
use crate::scanner::LocalPhotoSource;
use crate::scheduler::{Scheduler, SchedulerSettings};
use crate::speech::{CommandSpeechEngine, Narrator};
use crate::storage::{BlobStorage, LocalBlobStorage};

/// Everything a patient currently has on record.
#[derive(Debug, Clone)]
pub struct PatientStatus {
    pub summary: Option<ClusterSummary>,
    pub daily: DailyGenerationState,
    pub videos: Vec<GeneratedVideoRecord>,
    pub failures: Vec<GenerationFailure>,
}

pub struct Services {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub clusters: ClusterRepository,
    pub videos: VideoRepository,
    pub daily: DailyStateRepository,
    pub storage: Arc<dyn BlobStorage>,
    pub geocoder: Arc<dyn Geocoder>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<Scheduler>,
    source: LocalPhotoSource,
    engine: ClusterEngine,
}

impl Services {
    pub fn build(config: Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(
            SqliteStore::open(&config.db_path)
                .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
        );
        debug!("Database opened at {:?}", config.db_path);

        let clusters = ClusterRepository::new(store.clone());
        let videos = VideoRepository::new(store.clone());
        let daily = DailyStateRepository::new(store.clone());

        let storage: Arc<dyn BlobStorage> = Arc::new(
            LocalBlobStorage::new(&config.storage.root).with_context(|| {
                format!("Failed to open blob storage at {}", config.storage.root.display())
            })?,
        );

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let geocoder = build_geocoder(&config.geocoder);

        let engine = Arc::new(CommandSpeechEngine::from_config(&config.speech));
        let narrator = Arc::new(Narrator::from_config(engine, &config.speech));

        // A missing ffmpeg only fails composition, not catalog or status work
        let ffmpeg = find_ffmpeg(&config.video.ffmpeg_path).unwrap_or_else(|e| {
            warn!("{}", e);
            config.video.ffmpeg_path.clone().into()
        });
        let encoder = Arc::new(FfmpegEncoder::new(ffmpeg.clone(), EncodeSettings::from_config(&config.video)));
        let muxer = Arc::new(FfmpegMuxer::new(ffmpeg));

        let generation_seed = config.generation.seed;
        let pipeline = Arc::new(CompositionPipeline::new(
            clusters.clone(),
            videos.clone(),
            storage.clone(),
            narrator,
            encoder,
            muxer,
            clock.clone(),
            PipelineSettings::from_config(&config),
            seeded_rng(generation_seed.map(|s| s.wrapping_add(1))),
        ));

        let scheduler = Arc::new(Scheduler::new(
            clusters.clone(),
            videos.clone(),
            daily.clone(),
            storage.clone(),
            pipeline,
            clock.clone(),
            SchedulerSettings::from_config(&config.generation),
            seeded_rng(generation_seed),
        ));

        Ok(Self {
            source: LocalPhotoSource::from_config(&config.library),
            engine: ClusterEngine::from_config(&config.clustering),
            config,
            store,
            clusters,
            videos,
            daily,
            storage,
            geocoder,
            clock,
            scheduler,
        })
    }

    /// Re-scan the library and replace the patient's clusters.
    pub async fn rebuild_clusters(&self, patient_id: &str) -> Result<ClusterSummary> {
        let mut rng = seeded_rng(self.config.clustering.seed);
        catalog::rebuild_clusters(
            patient_id,
            &self.source,
            &self.engine,
            self.geocoder.as_ref(),
            &self.clusters,
            &mut rng,
        )
        .await
    }

    pub async fn status(&self, patient_id: &str) -> Result<PatientStatus> {
        let today = self.clock.today();
        Ok(PatientStatus {
            summary: self.clusters.get_summary(patient_id).await?,
            daily: self.daily.load(patient_id, &today).await?,
            videos: self.videos.list_for_patient(patient_id).await?,
            failures: self.videos.failures_for_patient(patient_id).await?,
        })
    }

    /// Remove clusters, videos (and their blobs) and the daily counters.
    pub async fn clear_patient(&self, patient_id: &str) -> Result<usize> {
        let clusters = self.clusters.delete_all_clusters(patient_id).await?;
        let removed = self.videos.delete_all_for_patient(patient_id).await?;
        for record in &removed {
            if let Err(e) = self.storage.delete(&record.video_url).await {
                debug!("Could not delete blob {}: {}", record.video_url, e);
            }
        }
        self.store.delete(&daily_state_doc(patient_id)).await?;

        info!(
            "Cleared patient {}: {} clusters, {} videos",
            patient_id,
            clusters,
            removed.len()
        );
        Ok(removed.len())
    }
}

fn build_geocoder(config: &GeocoderConfig) -> Arc<dyn Geocoder> {
    if config.enabled {
        Arc::new(CachedGeocoder::new(NominatimGeocoder::from_config(config)))
    } else {
        Arc::new(CoordinateGeocoder)
    }
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Pause between daemon polls, never zero.
pub fn poll_interval(config: &Config) -> Duration {
    Duration::from_secs(config.daemon.poll_interval_secs.max(1))
}
