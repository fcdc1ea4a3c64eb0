//! Daily generation scheduling.
//!
//! Every trigger follows the same shape under a per-patient lock:
//!
//! 1. Load the patient's [`DailyGenerationState`] and roll it over if the
//!    stored date is not today.
//! 2. Apply the trigger's own cleanup (signup wipes prior videos, midnight
//!    resets counters).
//! 3. Recount today's video records. That count is authoritative and
//!    replaces the cached one.
//! 4. Generate `max_videos_per_day - ground_truth` videos, one at a time,
//!    persisting the state after each success.
//!
//! Nothing is surfaced to the caller as an error; the [`BatchReport`] and
//! the logs describe what happened.

mod locks;
mod picker;

pub use locks::PatientLocks;
pub use picker::{candidate_pool, pick_next, Candidate};

use rand::rngs::StdRng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::GenerationConfig;
use crate::db::{ClusterRepository, DailyStateRepository, VideoRepository};
use crate::error::StoreResult;
use crate::model::{DailyGenerationState, GenerationFailure, TriggerType};
use crate::pipeline::VideoComposer;
use crate::storage::BlobStorage;

/// The event that started a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Signup,
    Login,
    Midnight,
    Background,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Signup => "signup",
            Trigger::Login => "login",
            Trigger::Midnight => "midnight",
            Trigger::Background => "background",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(Trigger::Signup),
            "login" => Some(Trigger::Login),
            "midnight" => Some(Trigger::Midnight),
            "background" => Some(Trigger::Background),
            _ => None,
        }
    }

    /// Tag written on the videos this trigger produces.
    pub fn tag(&self) -> TriggerType {
        match self {
            Trigger::Signup => TriggerType::Signup,
            Trigger::Login => TriggerType::LoginSupplement,
            Trigger::Midnight => TriggerType::DailyMidnight,
            Trigger::Background => TriggerType::Background,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one trigger for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub patient_id: String,
    pub trigger: Trigger,
    pub ground_truth: u32,
    /// Cached count that disagreed with the ground truth, if any.
    pub stale_count: Option<u32>,
    pub owed: u32,
    /// Source clusters of the videos produced, in generation order.
    pub generated: Vec<String>,
    pub failed: Vec<String>,
    pub pool_reset: bool,
    pub cancelled: bool,
    /// Set when the batch could not run at all.
    pub error: Option<String>,
}

impl BatchReport {
    fn new(patient_id: &str, trigger: Trigger) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            trigger,
            ground_truth: 0,
            stale_count: None,
            owed: 0,
            generated: Vec::new(),
            failed: Vec::new(),
            pool_reset: false,
            cancelled: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_videos_per_day: u32,
    pub cooldown: Duration,
    pub top_candidates: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_videos_per_day: config.max_videos_per_day,
            cooldown: Duration::from_millis(config.cooldown_ms),
            top_candidates: config.top_candidates,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

pub struct Scheduler {
    clusters: ClusterRepository,
    videos: VideoRepository,
    daily: DailyStateRepository,
    storage: Arc<dyn BlobStorage>,
    composer: Arc<dyn VideoComposer>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    rng: Mutex<StdRng>,
    locks: PatientLocks,
    cancel: Arc<AtomicBool>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clusters: ClusterRepository,
        videos: VideoRepository,
        daily: DailyStateRepository,
        storage: Arc<dyn BlobStorage>,
        composer: Arc<dyn VideoComposer>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            clusters,
            videos,
            daily,
            storage,
            composer,
            clock,
            settings,
            rng: Mutex::new(rng),
            locks: PatientLocks::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between videos. Setting it stops running batches after
    /// their current video.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run a trigger for a patient. Never fails; see the report.
    pub async fn handle(&self, patient_id: &str, trigger: Trigger) -> BatchReport {
        let _guard = self.locks.acquire(patient_id).await;
        info!("Trigger {} started for patient {}", trigger, patient_id);

        let mut report = BatchReport::new(patient_id, trigger);
        if let Err(e) = self.run(patient_id, trigger, &mut report).await {
            error!("Trigger {} for patient {} aborted: {}", trigger, patient_id, e);
            report.error = Some(e.to_string());
        }

        info!(
            "Trigger {} finished for patient {}: {} generated, {} failed, {} owed",
            trigger,
            patient_id,
            report.generated.len(),
            report.failed.len(),
            report.owed
        );
        report
    }

    async fn run(&self, patient_id: &str, trigger: Trigger, report: &mut BatchReport) -> StoreResult<()> {
        let today = self.clock.today();
        let mut state = self.daily.load(patient_id, &today).await?;
        if state.roll_over(&today) {
            info!("Daily counters reset for patient {} ({})", patient_id, today);
        }

        match trigger {
            Trigger::Signup => {
                state.clusters_used_today.clear();
                state.videos_generated_today = 0;
                self.remove_existing_videos(patient_id).await?;
            }
            Trigger::Midnight => state.reset(&today),
            Trigger::Login | Trigger::Background => {}
        }

        let ground_truth = self
            .videos
            .count_created_since(patient_id, self.clock.start_of_today_millis())
            .await?;
        if let Some(stale) = state.reconcile(ground_truth) {
            warn!(
                "Daily count mismatch for patient {}: stored {}, ground truth {}",
                patient_id, stale, ground_truth
            );
            report.stale_count = Some(stale);
        }
        report.ground_truth = ground_truth;
        report.owed = state.remaining(self.settings.max_videos_per_day);
        self.daily.save(patient_id, &state).await?;

        if report.owed == 0 {
            info!("Patient {} already has {} videos today", patient_id, ground_truth);
            return Ok(());
        }

        self.generate(patient_id, trigger, &mut state, report).await
    }

    /// Signup cleanup: drop every prior record, and the blobs on a best-effort basis.
    async fn remove_existing_videos(&self, patient_id: &str) -> StoreResult<()> {
        let removed = self.videos.delete_all_for_patient(patient_id).await?;
        for record in &removed {
            if let Err(e) = self.storage.delete(&record.video_url).await {
                debug!("Could not delete blob {}: {}", record.video_url, e);
            }
        }
        if !removed.is_empty() {
            info!("Removed {} existing videos for patient {}", removed.len(), patient_id);
        }
        Ok(())
    }

    fn pick(&self, pool: &mut Vec<Candidate>) -> Option<Candidate> {
        let top = self.settings.top_candidates;
        match self.rng.lock() {
            Ok(mut rng) => pick_next(pool, top, &mut *rng),
            Err(poisoned) => pick_next(pool, top, &mut *poisoned.into_inner()),
        }
    }

    async fn generate(
        &self,
        patient_id: &str,
        trigger: Trigger,
        state: &mut DailyGenerationState,
        report: &mut BatchReport,
    ) -> StoreResult<()> {
        let clusters = self.clusters.get_clusters(patient_id).await?;
        if clusters.is_empty() {
            warn!("No clusters stored for patient {}, nothing to generate", patient_id);
            report.error = Some("no clusters".to_string());
            return Ok(());
        }

        let mut pool = candidate_pool(&clusters, &state.clusters_used_today);
        if pool.is_empty() {
            info!(
                "All clusters used today for patient {}, clearing the used set",
                patient_id
            );
            state.clusters_used_today.clear();
            self.daily.save(patient_id, state).await?;
            report.pool_reset = true;
            pool = candidate_pool(&clusters, &state.clusters_used_today);
        }
        if pool.is_empty() {
            warn!("Patient {} has no clusters with photos", patient_id);
            report.error = Some("no clusters with photos".to_string());
            return Ok(());
        }

        let mut attempts = 0u32;
        while attempts < report.owed {
            if self.cancelled() {
                info!("Batch for patient {} cancelled", patient_id);
                report.cancelled = true;
                break;
            }
            let Some(candidate) = self.pick(&mut pool) else {
                info!("Cluster pool for patient {} exhausted", patient_id);
                break;
            };
            if attempts > 0 {
                tokio::time::sleep(self.settings.cooldown).await;
            }
            attempts += 1;

            self.generate_one(patient_id, trigger, &candidate.id, state, report).await;
        }
        Ok(())
    }

    async fn generate_one(
        &self,
        patient_id: &str,
        trigger: Trigger,
        cluster_id: &str,
        state: &mut DailyGenerationState,
        report: &mut BatchReport,
    ) {
        let cluster = match self.clusters.get_cluster_by_id(patient_id, cluster_id).await {
            Ok(cluster) => cluster,
            Err(e) => {
                warn!("Cluster {} vanished before generation: {}", cluster_id, e);
                self.record_failure(patient_id, cluster_id, trigger, "fetch_cluster", &e.to_string())
                    .await;
                report.failed.push(cluster_id.to_string());
                return;
            }
        };

        match self.composer.compose(patient_id, &cluster, trigger.tag()).await {
            Ok(record) => {
                state.record_success(&cluster.id);
                if let Err(e) = self.daily.save(patient_id, state).await {
                    // The next trigger's recount repairs the count
                    warn!("Failed to persist daily state for patient {}: {}", patient_id, e);
                }
                info!(
                    "Video {} generated for patient {} from cluster {} ({}/{} today)",
                    record.id,
                    patient_id,
                    cluster.id,
                    state.videos_generated_today,
                    self.settings.max_videos_per_day
                );
                report.generated.push(cluster.id);
            }
            Err(e) => {
                error!(
                    "Video generation failed for patient {} cluster {} at {}: {}",
                    patient_id,
                    cluster.id,
                    e.stage(),
                    e
                );
                self.record_failure(patient_id, &cluster.id, trigger, e.stage().as_str(), &e.to_string())
                    .await;
                report.failed.push(cluster.id);
            }
        }
    }

    async fn record_failure(&self, patient_id: &str, cluster_id: &str, trigger: Trigger, stage: &str, error: &str) {
        let failure = GenerationFailure {
            patient_id: patient_id.to_string(),
            cluster_id: cluster_id.to_string(),
            trigger: trigger.tag(),
            stage: stage.to_string(),
            error: error.to_string(),
            failed_at: self.clock.now_millis(),
        };
        if let Err(e) = self.videos.log_failure(&failure).await {
            warn!("Failed to write failure log entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{DocumentStore, SqliteStore};
    use crate::error::{PipelineError, PipelineResult};
    use crate::model::{GeneratedVideoRecord, PhotoCluster, PhotoRecord};
    use crate::storage::LocalBlobStorage;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use tempfile::TempDir;

    /// Writes a record per call, like the real pipeline, without media work.
    struct FakeComposer {
        videos: VideoRepository,
        clock: Arc<FixedClock>,
        fail_for: HashSet<String>,
        calls: Mutex<Vec<(String, TriggerType)>>,
    }

    #[async_trait]
    impl VideoComposer for FakeComposer {
        async fn compose(
            &self,
            patient_id: &str,
            cluster: &PhotoCluster,
            trigger: TriggerType,
        ) -> PipelineResult<GeneratedVideoRecord> {
            self.calls.lock().unwrap().push((cluster.id.clone(), trigger));
            if self.fail_for.contains(&cluster.id) {
                return Err(PipelineError::NoLoadablePhotos { attempted: 4 });
            }
            let record = GeneratedVideoRecord {
                id: uuid::Uuid::new_v4().to_string(),
                patient_id: patient_id.to_string(),
                cluster_id: cluster.id.clone(),
                video_url: format!("file:///nowhere/{}.mkv", cluster.id),
                trigger,
                created_at: self.clock.now_millis(),
                duration_secs: 16,
                photo_count: cluster.photo_count().min(4),
                has_narration: true,
            };
            self.videos.create(&record).await.unwrap();
            Ok(record)
        }
    }

    struct Harness {
        _blobs: TempDir,
        store: Arc<SqliteStore>,
        clock: Arc<FixedClock>,
        composer: Arc<FakeComposer>,
        scheduler: Scheduler,
    }

    impl Harness {
        fn new(fail_for: &[&str]) -> Self {
            let blobs = TempDir::new().unwrap();
            let store = Arc::new(SqliteStore::open_in_memory().unwrap());
            let clock = Arc::new(FixedClock::at(2024, 3, 5, 10).unwrap());
            let composer = Arc::new(FakeComposer {
                videos: VideoRepository::new(store.clone()),
                clock: clock.clone(),
                fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            });
            let scheduler = Scheduler::new(
                ClusterRepository::new(store.clone()),
                VideoRepository::new(store.clone()),
                DailyStateRepository::new(store.clone()),
                Arc::new(LocalBlobStorage::new(blobs.path()).unwrap()),
                composer.clone(),
                clock.clone(),
                SchedulerSettings {
                    max_videos_per_day: 10,
                    cooldown: Duration::from_millis(1000),
                    top_candidates: 5,
                },
                StdRng::seed_from_u64(42),
            );
            Self {
                _blobs: blobs,
                store,
                clock,
                composer,
                scheduler,
            }
        }

        async fn seed_clusters(&self, counts: &[usize]) -> Vec<String> {
            let clusters: Vec<PhotoCluster> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| {
                    let id = format!("loc{}_t{}", i, i);
                    let photos = (0..n)
                        .map(|j| PhotoRecord::new(format!("/photos/{}/{}.jpg", i, j), j as i64, None))
                        .collect();
                    PhotoCluster::from_members(id, photos)
                })
                .collect();
            ClusterRepository::new(self.store.clone())
                .store_clusters("p1", &clusters)
                .await
                .unwrap();
            clusters.into_iter().map(|c| c.id).collect()
        }

        async fn seed_videos_today(&self, n: usize) {
            let videos = VideoRepository::new(self.store.clone());
            for i in 0..n {
                videos
                    .create(&GeneratedVideoRecord {
                        id: format!("prior{}", i),
                        patient_id: "p1".to_string(),
                        cluster_id: format!("old{}", i),
                        video_url: format!("file:///nowhere/prior{}.mkv", i),
                        trigger: TriggerType::DailyMidnight,
                        created_at: self.clock.now_millis() - 60_000,
                        duration_secs: 12,
                        photo_count: 3,
                        has_narration: false,
                    })
                    .await
                    .unwrap();
            }
        }

        async fn save_state(&self, state: &DailyGenerationState) {
            DailyStateRepository::new(self.store.clone()).save("p1", state).await.unwrap();
        }

        async fn state(&self) -> DailyGenerationState {
            DailyStateRepository::new(self.store.clone())
                .load("p1", "unused")
                .await
                .unwrap()
        }

        async fn videos_today(&self) -> u32 {
            VideoRepository::new(self.store.clone())
                .count_created_since("p1", self.clock.start_of_today_millis())
                .await
                .unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signup_generates_one_video_per_cluster() {
        let h = Harness::new(&[]);
        let ids = h.seed_clusters(&[8, 5, 2]).await;
        h.seed_videos_today(2).await;

        let report = h.scheduler.handle("p1", Trigger::Signup).await;

        assert_eq!(report.owed, 10);
        assert_eq!(report.generated.len(), 3);
        let generated: HashSet<_> = report.generated.iter().cloned().collect();
        assert_eq!(generated, ids.into_iter().collect());

        let records = VideoRepository::new(h.store.clone()).list_for_patient("p1").await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.trigger == TriggerType::Signup));

        let state = h.state().await;
        assert_eq!(state.videos_generated_today, 3);
        assert_eq!(state.clusters_used_today.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_reconciles_to_ground_truth() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[3; 12]).await;
        h.seed_videos_today(6).await;
        let mut stored = DailyGenerationState::new("2024-03-05");
        stored.videos_generated_today = 4;
        h.save_state(&stored).await;

        let report = h.scheduler.handle("p1", Trigger::Login).await;

        assert_eq!(report.ground_truth, 6);
        assert_eq!(report.stale_count, Some(4));
        assert_eq!(report.owed, 4);
        assert_eq!(report.generated.len(), 4);
        let calls = h.composer.calls.lock().unwrap().clone();
        assert!(calls.iter().all(|(_, t)| *t == TriggerType::LoginSupplement));
        assert_eq!(h.videos_today().await, 10);
        assert_eq!(h.state().await.videos_generated_today, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_at_cap_only_syncs() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[3, 3]).await;
        h.seed_videos_today(10).await;

        let report = h.scheduler.handle("p1", Trigger::Login).await;
        assert_eq!(report.owed, 0);
        assert!(report.generated.is_empty());
        assert_eq!(h.state().await.videos_generated_today, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_resets_used_set() {
        let h = Harness::new(&[]);
        let ids = h.seed_clusters(&[4, 4, 4]).await;
        h.seed_videos_today(3).await;
        let mut stored = DailyGenerationState::new("2024-03-05");
        stored.videos_generated_today = 3;
        stored.clusters_used_today = ids.iter().cloned().collect();
        h.save_state(&stored).await;

        let report = h.scheduler.handle("p1", Trigger::Login).await;

        assert!(report.pool_reset);
        assert_eq!(report.generated.len(), 3);
        assert_eq!(h.state().await.clusters_used_today.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_cap_holds_across_triggers() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[2; 15]).await;

        for trigger in [
            Trigger::Signup,
            Trigger::Login,
            Trigger::Midnight,
            Trigger::Background,
            Trigger::Midnight,
            Trigger::Login,
        ] {
            h.scheduler.handle("p1", trigger).await;
            assert!(h.videos_today().await <= 10, "after {}", trigger);
        }
        assert_eq!(h.videos_today().await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_triggers_respect_cap() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[2; 15]).await;

        let (a, b) = tokio::join!(
            h.scheduler.handle("p1", Trigger::Login),
            h.scheduler.handle("p1", Trigger::Background)
        );
        assert_eq!(a.generated.len() + b.generated.len(), 10);
        assert_eq!(h.videos_today().await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_repeats_within_a_day() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]).await;
        let mut stored = DailyGenerationState::new("2024-03-05");
        stored.videos_generated_today = 0;
        h.save_state(&stored).await;

        h.scheduler.handle("p1", Trigger::Midnight).await;

        let records = VideoRepository::new(h.store.clone()).list_for_patient("p1").await.unwrap();
        let clusters: HashSet<_> = records.iter().map(|r| r.cluster_id.clone()).collect();
        assert_eq!(records.len(), 10);
        assert_eq!(clusters.len(), 10);
        assert!(records.iter().all(|r| r.trigger == TriggerType::DailyMidnight));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_logged_and_batch_continues() {
        let h = Harness::new(&["loc0_t0"]);
        h.seed_clusters(&[9, 2, 1]).await;

        let report = h.scheduler.handle("p1", Trigger::Signup).await;

        assert_eq!(report.failed, vec!["loc0_t0".to_string()]);
        assert_eq!(report.generated.len(), 2);
        assert_eq!(h.state().await.videos_generated_today, 2);

        let failures = VideoRepository::new(h.store.clone())
            .failures_for_patient("p1")
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, "prepare_frames");
        assert_eq!(failures[0].trigger, TriggerType::Signup);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_between_videos() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[3, 3, 3]).await;

        let started = tokio::time::Instant::now();
        h.scheduler.handle("p1", Trigger::Signup).await;
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_batch() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[3, 3, 3]).await;
        h.scheduler.cancel_flag().store(true, Ordering::SeqCst);

        let report = h.scheduler.handle("p1", Trigger::Signup).await;
        assert!(report.cancelled);
        assert!(report.generated.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_clusters_is_a_no_op() {
        let h = Harness::new(&[]);
        let report = h.scheduler.handle("p1", Trigger::Login).await;
        assert!(report.generated.is_empty());
        assert!(report.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_day_resets_stale_state() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[3; 4]).await;
        let mut stored = DailyGenerationState::new("2024-03-04");
        stored.videos_generated_today = 10;
        stored.clusters_used_today = ["loc0_t0".to_string()].into_iter().collect();
        h.save_state(&stored).await;

        let report = h.scheduler.handle("p1", Trigger::Login).await;
        assert_eq!(report.owed, 10);
        assert_eq!(report.generated.len(), 4);
        assert_eq!(h.state().await.last_reset_date, "2024-03-05");
    }

    #[test]
    fn test_trigger_tags() {
        assert_eq!(Trigger::Login.tag(), TriggerType::LoginSupplement);
        assert_eq!(Trigger::Midnight.tag(), TriggerType::DailyMidnight);
        assert_eq!(Trigger::from_str("background"), Some(Trigger::Background));
        assert_eq!(Trigger::from_str("daily"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signup_wipe_is_not_a_count_mismatch() {
        let h = Harness::new(&[]);
        h.seed_clusters(&[3, 2]).await;
        h.seed_videos_today(3).await;
        let mut stored = DailyGenerationState::new("2024-03-05");
        stored.videos_generated_today = 3;
        h.save_state(&stored).await;

        let report = h.scheduler.handle("p1", Trigger::Signup).await;

        assert_eq!(report.ground_truth, 0);
        assert_eq!(report.stale_count, None);
        assert_eq!(report.generated.len(), 2);
        assert_eq!(h.state().await.videos_generated_today, 2);
    }

    #[tokio::test]
    async fn test_signup_removes_prior_records() {
        let h = Harness::new(&[]);
        h.seed_videos_today(2).await;
        h.scheduler.handle("p1", Trigger::Signup).await;
        assert!(h.store.get("generated_videos/prior0").await.unwrap().is_none());
    }
}
