//! Cluster snapshots and the per-patient cluster summary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    clusters_collection, cluster_doc, sanitize_key, summary_doc, validate_segment, DocumentStore,
    WriteBatch,
};
use crate::error::{StoreError, StoreResult};
use crate::geo::GeoPoint;
use crate::model::{PhotoCluster, PhotoRecord, TimeOfDay};

/// Aggregate statistics written alongside every cluster snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub total_clusters: usize,
    pub total_photos: usize,
    pub clusters_with_location: usize,
    /// Clusters per time-of-day bucket of their first photo.
    pub time_of_day: BTreeMap<String, usize>,
}

impl ClusterSummary {
    pub fn compute(clusters: &[PhotoCluster]) -> Self {
        let mut time_of_day: BTreeMap<String, usize> = TimeOfDay::ALL
            .iter()
            .map(|bucket| (bucket.as_str().to_string(), 0))
            .collect();

        for cluster in clusters {
            *time_of_day
                .entry(cluster.time_of_day().as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total_clusters: clusters.len(),
            total_photos: clusters.iter().map(|c| c.photo_count()).sum(),
            clusters_with_location: clusters.iter().filter(|c| c.has_location()).count(),
            time_of_day,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPhoto {
    uri: String,
    captured_at_millis: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    time_of_day: TimeOfDay,
    cluster_id: Option<String>,
    order: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCluster {
    id: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    start_time: i64,
    end_time: i64,
    location_name: Option<String>,
    time_description: String,
    photo_count: usize,
    /// Photos keyed by `{order}_{sanitized uri}`.
    photos: BTreeMap<String, StoredPhoto>,
    #[serde(default)]
    video_generated: bool,
    #[serde(default)]
    video_generated_at: Option<i64>,
}

impl StoredCluster {
    fn from_cluster(cluster: &PhotoCluster) -> Self {
        let photos = cluster
            .photos
            .iter()
            .enumerate()
            .map(|(order, photo)| {
                (
                    photo_key(order, &photo.uri),
                    StoredPhoto {
                        uri: photo.uri.clone(),
                        captured_at_millis: photo.captured_at_millis,
                        latitude: photo.location.map(|p| p.latitude),
                        longitude: photo.location.map(|p| p.longitude),
                        time_of_day: photo.time_of_day,
                        cluster_id: photo.cluster_id.clone(),
                        order,
                    },
                )
            })
            .collect();

        Self {
            id: cluster.id.clone(),
            latitude: cluster.location.map(|p| p.latitude),
            longitude: cluster.location.map(|p| p.longitude),
            start_time: cluster.start_time,
            end_time: cluster.end_time,
            location_name: cluster.location_name.clone(),
            time_description: cluster.time_description.clone(),
            photo_count: cluster.photo_count(),
            photos,
            video_generated: false,
            video_generated_at: None,
        }
    }

    fn into_cluster(self) -> PhotoCluster {
        let mut stored: Vec<StoredPhoto> = self.photos.into_values().collect();
        stored.sort_by_key(|p| p.order);

        let photos = stored
            .into_iter()
            .map(|p| PhotoRecord {
                uri: p.uri,
                captured_at_millis: p.captured_at_millis,
                location: point(p.latitude, p.longitude),
                time_of_day: p.time_of_day,
                cluster_id: p.cluster_id,
            })
            .collect();

        PhotoCluster {
            id: self.id,
            location: point(self.latitude, self.longitude),
            start_time: self.start_time,
            end_time: self.end_time,
            location_name: self.location_name,
            time_description: self.time_description,
            photos,
        }
    }
}

/// Sanitizing alone can map two URIs to one key; the member position keeps
/// keys unique within a cluster.
fn photo_key(order: usize, uri: &str) -> String {
    format!("{:04}_{}", order, sanitize_key(uri))
}

fn point(latitude: Option<f64>, longitude: Option<f64>) -> Option<GeoPoint> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    }
}

/// Reads and writes cluster snapshots for patients.
#[derive(Clone)]
pub struct ClusterRepository {
    store: Arc<dyn DocumentStore>,
}

impl ClusterRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write every cluster in one batch, then the recomputed summary.
    ///
    /// The summary write is separate from the batch, so a failure there
    /// leaves the clusters in place.
    pub async fn store_clusters(&self, patient_id: &str, clusters: &[PhotoCluster]) -> StoreResult<()> {
        validate_segment(patient_id)?;

        let mut batch = WriteBatch::new();
        for cluster in clusters {
            validate_segment(&cluster.id)?;
            let doc = serde_json::to_value(StoredCluster::from_cluster(cluster))?;
            batch.set(cluster_doc(patient_id, &cluster.id), doc);
        }
        self.store.commit(batch).await?;

        let summary = ClusterSummary::compute(clusters);
        self.store
            .set(&summary_doc(patient_id), serde_json::to_value(&summary)?)
            .await?;

        debug!(
            "Stored {} clusters ({} photos) for patient {}",
            summary.total_clusters, summary.total_photos, patient_id
        );
        Ok(())
    }

    /// All stored clusters. Documents that cannot be decoded are skipped.
    pub async fn get_clusters(&self, patient_id: &str) -> StoreResult<Vec<PhotoCluster>> {
        let docs = self.store.list(&clusters_collection(patient_id)).await?;

        let clusters = docs
            .into_iter()
            .filter_map(|(id, doc)| match serde_json::from_value::<StoredCluster>(doc) {
                Ok(stored) => Some(stored.into_cluster()),
                Err(e) => {
                    warn!("Skipping malformed cluster {} for patient {}: {}", id, patient_id, e);
                    None
                }
            })
            .collect();
        Ok(clusters)
    }

    pub async fn get_cluster_by_id(&self, patient_id: &str, cluster_id: &str) -> StoreResult<PhotoCluster> {
        let path = cluster_doc(patient_id, cluster_id);
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| StoreError::not_found(&path))?;

        let stored: StoredCluster =
            serde_json::from_value(doc).map_err(|e| StoreError::malformed(&path, e.to_string()))?;
        Ok(stored.into_cluster())
    }

    pub async fn get_summary(&self, patient_id: &str) -> StoreResult<Option<ClusterSummary>> {
        match self.store.get(&summary_doc(patient_id)).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Remove every cluster and the summary for a patient.
    pub async fn delete_all_clusters(&self, patient_id: &str) -> StoreResult<usize> {
        validate_segment(patient_id)?;
        let removed = self
            .store
            .delete_collection(&clusters_collection(patient_id))
            .await?;
        self.store.delete(&summary_doc(patient_id)).await?;
        Ok(removed)
    }

    /// Set the lifetime "made into a video" flag on a cluster.
    pub async fn mark_video_generated(&self, patient_id: &str, cluster_id: &str, at_millis: i64) -> StoreResult<()> {
        let mut fields = Map::new();
        fields.insert("videoGenerated".to_string(), Value::Bool(true));
        fields.insert("videoGeneratedAt".to_string(), json!(at_millis));
        self.store.merge(&cluster_doc(patient_id, cluster_id), fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    fn repo() -> (Arc<SqliteStore>, ClusterRepository) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let repo = ClusterRepository::new(store.clone());
        (store, repo)
    }

    fn sample_cluster(id: &str, n: usize, location: Option<GeoPoint>) -> PhotoCluster {
        let photos = (0..n)
            .map(|i| PhotoRecord::new(format!("content://media/{}/{}.jpg", id, i), 1_000 * i as i64, location))
            .collect();
        PhotoCluster::from_members(id.to_string(), photos)
    }

    #[tokio::test]
    async fn test_store_and_get_preserves_photo_order() {
        let (_, repo) = repo();
        let mut cluster = sample_cluster("a_1", 5, Some(GeoPoint::new(-37.8, 144.9)));
        cluster.location_name = Some("Melbourne".to_string());
        repo.store_clusters("p1", &[cluster.clone()]).await.unwrap();

        let fetched = repo.get_cluster_by_id("p1", "a_1").await.unwrap();
        assert_eq!(fetched, cluster);
    }

    #[tokio::test]
    async fn test_uris_that_sanitize_alike_are_both_kept() {
        let (_, repo) = repo();
        let photos = vec![
            PhotoRecord::new("/photos/IMG.1.jpg", 1_000, None),
            PhotoRecord::new("/photos/IMG_1.jpg", 2_000, None),
        ];
        let cluster = PhotoCluster::from_members("c1".to_string(), photos);
        repo.store_clusters("p1", &[cluster]).await.unwrap();

        let fetched = repo.get_cluster_by_id("p1", "c1").await.unwrap();
        assert_eq!(fetched.photo_count(), 2);
        let uris: Vec<&str> = fetched.photos.iter().map(|p| p.uri.as_str()).collect();
        assert_eq!(uris, vec!["/photos/IMG.1.jpg", "/photos/IMG_1.jpg"]);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let (_, repo) = repo();
        let clusters = vec![
            sample_cluster("a_1", 3, Some(GeoPoint::new(1.0, 1.0))),
            sample_cluster("b_1", 2, None),
            sample_cluster("c_1", 1, Some(GeoPoint::new(0.0, 0.0))),
        ];
        repo.store_clusters("p1", &clusters).await.unwrap();

        let summary = repo.get_summary("p1").await.unwrap().unwrap();
        assert_eq!(summary.total_clusters, 3);
        assert_eq!(summary.total_photos, 6);
        assert_eq!(summary.clusters_with_location, 1);
        assert_eq!(summary.time_of_day.values().sum::<usize>(), 3);
    }

    #[tokio::test]
    async fn test_malformed_cluster_is_skipped() {
        let (store, repo) = repo();
        repo.store_clusters("p1", &[sample_cluster("a_1", 2, None)]).await.unwrap();
        store
            .set("patients/p1/clusters/broken", json!({"id": "broken", "startTime": "soon"}))
            .await
            .unwrap();

        let clusters = repo.get_clusters("p1").await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, "a_1");
    }

    #[tokio::test]
    async fn test_missing_cluster_is_not_found() {
        let (_, repo) = repo();
        assert!(matches!(
            repo.get_cluster_by_id("p1", "nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_all_and_mark_generated() {
        let (store, repo) = repo();
        repo.store_clusters("p1", &[sample_cluster("a_1", 2, None), sample_cluster("b_1", 1, None)])
            .await
            .unwrap();

        repo.mark_video_generated("p1", "a_1", 42).await.unwrap();
        let doc = store.get("patients/p1/clusters/a_1").await.unwrap().unwrap();
        assert_eq!(doc["videoGenerated"], json!(true));
        // Flag does not break decoding
        assert_eq!(repo.get_clusters("p1").await.unwrap().len(), 2);

        assert_eq!(repo.delete_all_clusters("p1").await.unwrap(), 2);
        assert!(repo.get_clusters("p1").await.unwrap().is_empty());
        assert!(repo.get_summary("p1").await.unwrap().is_none());
    }
}
