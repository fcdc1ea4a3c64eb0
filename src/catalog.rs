//! Rebuilding a patient's cluster snapshot from their photo library.

use anyhow::{Context, Result};
use rand::Rng;
use tracing::info;

use crate::clustering::ClusterEngine;
use crate::db::{ClusterRepository, ClusterSummary};
use crate::geocode::{resolve_location_names, Geocoder};
use crate::scanner::PhotoSource;

/// Scan, cluster, name and store. The previous snapshot is removed first,
/// since cluster ids differ between runs.
pub async fn rebuild_clusters<R: Rng + Send + ?Sized>(
    patient_id: &str,
    source: &dyn PhotoSource,
    engine: &ClusterEngine,
    geocoder: &dyn Geocoder,
    repository: &ClusterRepository,
    rng: &mut R,
) -> Result<ClusterSummary> {
    let photos = source
        .list_photos()
        .await
        .context("Failed to list photos")?;
    info!("Clustering {} photos for patient {}", photos.len(), patient_id);

    let mut clusters = engine.cluster(&photos, rng);
    resolve_location_names(geocoder, &mut clusters).await;

    let removed = repository
        .delete_all_clusters(patient_id)
        .await
        .context("Failed to clear previous clusters")?;
    repository
        .store_clusters(patient_id, &clusters)
        .await
        .context("Failed to store clusters")?;

    let summary = ClusterSummary::compute(&clusters);
    info!(
        "Stored {} clusters for patient {} (replaced {})",
        summary.total_clusters, patient_id, removed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::geo::GeoPoint;
    use crate::geocode::CoordinateGeocoder;
    use crate::model::{PhotoRecord, UNKNOWN_LOCATION};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    struct FixedSource(Vec<PhotoRecord>);

    #[async_trait]
    impl PhotoSource for FixedSource {
        async fn list_photos(&self) -> Result<Vec<PhotoRecord>> {
            Ok(self.0.clone())
        }
    }

    const HOUR: i64 = 60 * 60 * 1000;

    fn library() -> Vec<PhotoRecord> {
        let park = GeoPoint::new(-37.5622, 143.8503);
        vec![
            PhotoRecord::new("/p/1.jpg", 10 * HOUR, Some(park)),
            PhotoRecord::new("/p/2.jpg", 11 * HOUR, Some(park)),
            PhotoRecord::new("/p/3.jpg", 30 * HOUR, Some(park)),
            PhotoRecord::new("/p/4.jpg", 12 * HOUR, None),
        ]
    }

    #[tokio::test]
    async fn test_rebuild_replaces_snapshot() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let repository = ClusterRepository::new(store);
        let engine = ClusterEngine::default();
        let mut rng = StdRng::seed_from_u64(3);

        let summary = rebuild_clusters(
            "p1",
            &FixedSource(library()),
            &engine,
            &CoordinateGeocoder,
            &repository,
            &mut rng,
        )
        .await
        .unwrap();

        assert_eq!(summary.total_clusters, 3);
        assert_eq!(summary.total_photos, 4);
        assert_eq!(summary.clusters_with_location, 2);

        let stored = repository.get_clusters("p1").await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored
            .iter()
            .filter(|c| !c.has_location())
            .all(|c| c.location_name.as_deref() == Some(UNKNOWN_LOCATION)));
        assert!(stored
            .iter()
            .filter(|c| c.has_location())
            .all(|c| c.location_name.as_deref() == Some("-37.5622, 143.8503")));

        // A second run leaves only the new ids behind
        let first_ids: Vec<String> = stored.iter().map(|c| c.id.clone()).collect();
        rebuild_clusters(
            "p1",
            &FixedSource(library()),
            &engine,
            &CoordinateGeocoder,
            &repository,
            &mut rng,
        )
        .await
        .unwrap();
        let stored = repository.get_clusters("p1").await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|c| !first_ids.contains(&c.id)));
    }

    #[tokio::test]
    async fn test_rebuild_with_empty_library() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let repository = ClusterRepository::new(store);
        let mut rng = StdRng::seed_from_u64(1);

        let summary = rebuild_clusters(
            "p1",
            &FixedSource(Vec::new()),
            &ClusterEngine::default(),
            &CoordinateGeocoder,
            &repository,
            &mut rng,
        )
        .await
        .unwrap();

        assert_eq!(summary.total_clusters, 0);
        assert!(repository.get_clusters("p1").await.unwrap().is_empty());
    }
}
