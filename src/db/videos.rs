//! Generated-video records and the generation failure log.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::{split_path, DocumentStore, Filter, FAILURES_COLLECTION, VIDEOS_COLLECTION};
use crate::error::{StoreError, StoreResult};
use crate::model::{GeneratedVideoRecord, GenerationFailure};

#[derive(Clone)]
pub struct VideoRepository {
    store: Arc<dyn DocumentStore>,
}

impl VideoRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn video_path(id: &str) -> String {
        format!("{}/{}", VIDEOS_COLLECTION, id)
    }

    pub async fn create(&self, record: &GeneratedVideoRecord) -> StoreResult<()> {
        let path = Self::video_path(&record.id);
        split_path(&path)?;
        self.store.set(&path, serde_json::to_value(record)?).await
    }

    /// Swap in the merged (narrated) URL. The only mutation a record sees.
    pub async fn patch_video_url(&self, id: &str, url: &str, has_narration: bool) -> StoreResult<()> {
        let path = Self::video_path(id);
        if self.store.get(&path).await?.is_none() {
            return Err(StoreError::not_found(path));
        }

        let mut fields = Map::new();
        fields.insert("videoUrl".to_string(), Value::String(url.to_string()));
        fields.insert("hasNarration".to_string(), Value::Bool(has_narration));
        self.store.merge(&path, fields).await
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<GeneratedVideoRecord>> {
        match self.store.get(&Self::video_path(id)).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Ground-truth count of videos created for a patient at or after `since_millis`.
    pub async fn count_created_since(&self, patient_id: &str, since_millis: i64) -> StoreResult<u32> {
        let filters = [
            Filter::eq("patientId", patient_id),
            Filter::gte("createdAt", since_millis),
        ];
        let count = self.store.count(VIDEOS_COLLECTION, &filters).await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Records for a patient, oldest first.
    pub async fn list_for_patient(&self, patient_id: &str) -> StoreResult<Vec<GeneratedVideoRecord>> {
        let docs = self
            .store
            .query(VIDEOS_COLLECTION, &[Filter::eq("patientId", patient_id)])
            .await?;

        let mut records: Vec<GeneratedVideoRecord> = docs
            .into_iter()
            .filter_map(|(id, doc)| match serde_json::from_value(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed video record {}: {}", id, e);
                    None
                }
            })
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    /// Delete every record for a patient and return what was removed, so
    /// callers can clean up the blobs they point at.
    pub async fn delete_all_for_patient(&self, patient_id: &str) -> StoreResult<Vec<GeneratedVideoRecord>> {
        let records = self.list_for_patient(patient_id).await?;
        let mut batch = super::WriteBatch::new();
        for record in &records {
            batch.delete(Self::video_path(&record.id));
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(records)
    }

    pub async fn log_failure(&self, failure: &GenerationFailure) -> StoreResult<()> {
        let path = format!("{}/{}", FAILURES_COLLECTION, Uuid::new_v4());
        self.store.set(&path, serde_json::to_value(failure)?).await
    }

    pub async fn failures_for_patient(&self, patient_id: &str) -> StoreResult<Vec<GenerationFailure>> {
        let docs = self
            .store
            .query(FAILURES_COLLECTION, &[Filter::eq("patientId", patient_id)])
            .await?;
        let mut failures: Vec<GenerationFailure> = docs
            .into_iter()
            .filter_map(|(_, doc)| serde_json::from_value(doc).ok())
            .collect();
        failures.sort_by_key(|f| f.failed_at);
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::model::TriggerType;

    fn record(id: &str, patient: &str, created_at: i64) -> GeneratedVideoRecord {
        GeneratedVideoRecord {
            id: id.to_string(),
            patient_id: patient.to_string(),
            cluster_id: format!("cluster_{}", id),
            video_url: format!("file:///videos/{}.mp4", id),
            trigger: TriggerType::Signup,
            created_at,
            duration_secs: 16,
            photo_count: 4,
            has_narration: false,
        }
    }

    fn repo() -> VideoRepository {
        VideoRepository::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_count_created_since() {
        let repo = repo();
        repo.create(&record("v1", "p1", 100)).await.unwrap();
        repo.create(&record("v2", "p1", 200)).await.unwrap();
        repo.create(&record("v3", "p1", 300)).await.unwrap();
        repo.create(&record("v4", "p2", 300)).await.unwrap();

        assert_eq!(repo.count_created_since("p1", 200).await.unwrap(), 2);
        assert_eq!(repo.count_created_since("p1", 0).await.unwrap(), 3);
        assert_eq!(repo.count_created_since("p2", 301).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_patch_video_url() {
        let repo = repo();
        repo.create(&record("v1", "p1", 100)).await.unwrap();
        repo.patch_video_url("v1", "file:///videos/merged.mp4", true).await.unwrap();

        let patched = repo.get("v1").await.unwrap().unwrap();
        assert_eq!(patched.video_url, "file:///videos/merged.mp4");
        assert!(patched.has_narration);
        assert_eq!(patched.created_at, 100);

        assert!(matches!(
            repo.patch_video_url("missing", "x", true).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_all_for_patient() {
        let repo = repo();
        repo.create(&record("v1", "p1", 100)).await.unwrap();
        repo.create(&record("v2", "p2", 100)).await.unwrap();

        let removed = repo.delete_all_for_patient("p1").await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(repo.list_for_patient("p1").await.unwrap().is_empty());
        assert_eq!(repo.list_for_patient("p2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_log() {
        let repo = repo();
        let failure = GenerationFailure {
            patient_id: "p1".to_string(),
            cluster_id: "c1".to_string(),
            trigger: TriggerType::LoginSupplement,
            stage: "encode".to_string(),
            error: "ffmpeg exited with 1".to_string(),
            failed_at: 5,
        };
        repo.log_failure(&failure).await.unwrap();
        assert_eq!(repo.failures_for_patient("p1").await.unwrap(), vec![failure]);
    }
}
