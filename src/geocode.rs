//! Reverse geocoding of cluster locations.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;
use crate::error::{GeocodeError, GeocodeResult};
use crate::geo::GeoPoint;
use crate::model::{PhotoCluster, UNKNOWN_LOCATION};

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Human-readable place name for a point.
    async fn resolve(&self, point: GeoPoint) -> GeocodeResult<String>;
}

/// Fallback label when no place name is available.
pub fn coordinate_label(point: GeoPoint) -> String {
    format!("{:.4}, {:.4}", point.latitude, point.longitude)
}

/// Pick a short name out of a Nominatim reverse response.
pub fn place_name_from_response(body: &Value) -> Option<String> {
    let address = body.get("address");
    let field = |key: &str| {
        address
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let locality = ["suburb", "village", "town", "city", "hamlet", "county"]
        .iter()
        .find_map(|key| field(key));
    let region = ["state", "country"].iter().find_map(|key| field(key));

    match (locality, region) {
        (Some(locality), Some(region)) => Some(format!("{}, {}", locality, region)),
        (Some(locality), None) => Some(locality),
        _ => body
            .get("display_name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
    }
}

/// Nominatim-compatible reverse geocoding over HTTP.
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &GeocoderConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn lookup(agent: &ureq::Agent, endpoint: &str, point: GeoPoint) -> GeocodeResult<String> {
        let body: Value = agent
            .get(endpoint)
            .query("format", "jsonv2")
            .query("lat", &point.latitude.to_string())
            .query("lon", &point.longitude.to_string())
            .query("zoom", "14")
            .call()
            .map_err(|e| GeocodeError::Request(e.to_string()))?
            .into_json()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        place_name_from_response(&body).ok_or(GeocodeError::NoResult {
            latitude: point.latitude,
            longitude: point.longitude,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, point: GeoPoint) -> GeocodeResult<String> {
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        tokio::task::spawn_blocking(move || Self::lookup(&agent, &endpoint, point))
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?
    }
}

/// Offline geocoder that labels points with their coordinates.
pub struct CoordinateGeocoder;

#[async_trait]
impl Geocoder for CoordinateGeocoder {
    async fn resolve(&self, point: GeoPoint) -> GeocodeResult<String> {
        Ok(coordinate_label(point))
    }
}

/// Memoises another geocoder by coordinates rounded to 4 decimal places
/// (about 11 m).
pub struct CachedGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<(i64, i64), String>>,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn key(point: GeoPoint) -> (i64, i64) {
        (
            (point.latitude * 10_000.0).round() as i64,
            (point.longitude * 10_000.0).round() as i64,
        )
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    async fn resolve(&self, point: GeoPoint) -> GeocodeResult<String> {
        let key = Self::key(point);
        if let Some(name) = self.cache.lock().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(name);
        }

        let name = self.inner.resolve(point).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, name.clone());
        }
        Ok(name)
    }
}

/// Fill `location_name` on every cluster.
///
/// Location-less clusters get the unknown placeholder; lookup failures fall
/// back to the coordinate label.
pub async fn resolve_location_names(geocoder: &dyn Geocoder, clusters: &mut [PhotoCluster]) {
    for cluster in clusters.iter_mut() {
        let point = match cluster.location {
            Some(point) if cluster.has_location() => point,
            _ => {
                cluster.location_name = Some(UNKNOWN_LOCATION.to_string());
                continue;
            }
        };

        let name = match geocoder.resolve(point).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Geocoding failed for cluster {}: {}", cluster.id, e);
                coordinate_label(point)
            }
        };
        debug!("Cluster {} is at {}", cluster.id, name);
        cluster.location_name = Some(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhotoRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGeocoder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn resolve(&self, point: GeoPoint) -> GeocodeResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeocodeError::Request("offline".to_string()));
            }
            Ok(format!("Place {:.1}", point.latitude))
        }
    }

    #[test]
    fn test_place_name_from_response() {
        let body = json!({
            "display_name": "Sturt Street, Ballarat Central, Ballarat, Victoria, 3350, Australia",
            "address": {"suburb": "Ballarat Central", "city": "Ballarat", "state": "Victoria"}
        });
        assert_eq!(
            place_name_from_response(&body),
            Some("Ballarat Central, Victoria".to_string())
        );

        let body = json!({"display_name": "Somewhere"});
        assert_eq!(place_name_from_response(&body), Some("Somewhere".to_string()));

        assert_eq!(place_name_from_response(&json!({"error": "Unable to geocode"})), None);
    }

    #[tokio::test]
    async fn test_cache_rounds_coordinates() {
        let cached = CachedGeocoder::new(CountingGeocoder {
            calls: AtomicUsize::new(0),
            fail: false,
        });

        let a = cached.resolve(GeoPoint::new(-37.56221, 143.85001)).await.unwrap();
        let b = cached.resolve(GeoPoint::new(-37.56222, 143.85002)).await.unwrap();
        cached.resolve(GeoPoint::new(-37.6, 143.9)).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cached_len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_location_names_fallbacks() {
        let geocoder = CountingGeocoder {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let mut clusters = vec![
            PhotoCluster::from_members(
                "a".to_string(),
                vec![PhotoRecord::new("x", 0, Some(GeoPoint::new(-37.5, 143.8)))],
            ),
            PhotoCluster::from_members("b".to_string(), vec![PhotoRecord::new("y", 0, None)]),
        ];

        resolve_location_names(&geocoder, &mut clusters).await;

        assert_eq!(clusters[0].location_name.as_deref(), Some("-37.5000, 143.8000"));
        assert_eq!(clusters[1].location_name.as_deref(), Some(UNKNOWN_LOCATION));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }
}
