//! Pluggable route providers used by movement simulation.
//!
//! - **`StraightLineRouteProvider`**: great-circle segment, no dependencies.
//! - **`OsrmRouteProvider`** (feature `osrm`): road geometry from an OSRM endpoint.
//!
//! Either is usually wrapped in [`CachedRouteProvider`] and stored as an
//! `Arc<dyn RouteProvider>` ECS resource.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::model::Location;
use crate::spatial::distance_km;

/// Average speed assumed when a provider has no travel time of its own.
const FALLBACK_SPEED_KMH: f64 = 60.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// (lat, lng) waypoints from start to end.
    pub waypoints: Vec<(f64, f64)>,
    pub distance_km: f64,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum RouteProviderKind {
    #[default]
    StraightLine,
    /// OSRM HTTP endpoint, e.g. `"http://localhost:5000"`.
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

/// Routing backend. `None` means no route could be produced.
pub trait RouteProvider: Send + Sync {
    fn route(&self, from: &Location, to: &Location) -> Option<RouteResult>;
}

#[derive(Resource, Clone)]
pub struct RouteProviderResource(pub Arc<dyn RouteProvider>);

pub struct StraightLineRouteProvider;

impl RouteProvider for StraightLineRouteProvider {
    fn route(&self, from: &Location, to: &Location) -> Option<RouteResult> {
        let distance_km = distance_km(from, to);
        Some(RouteResult {
            waypoints: vec![from.as_lat_lng(), to.as_lat_lng()],
            distance_km,
            duration_secs: distance_km / FALLBACK_SPEED_KMH * 3600.0,
        })
    }
}

#[cfg(feature = "osrm")]
pub mod osrm {
    use super::*;
    use reqwest::blocking::Client;
    use std::time::Duration;

    pub struct OsrmRouteProvider {
        client: Client,
        endpoint: String,
    }

    impl OsrmRouteProvider {
        pub fn new(endpoint: &str) -> Result<Self, reqwest::Error> {
            let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
            Ok(Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            })
        }
    }

    #[derive(Deserialize)]
    struct OsrmResponse {
        code: String,
        routes: Option<Vec<OsrmRoute>>,
    }

    #[derive(Deserialize)]
    struct OsrmRoute {
        distance: f64, // metres
        duration: f64, // seconds
        geometry: OsrmGeometry,
    }

    #[derive(Deserialize)]
    struct OsrmGeometry {
        coordinates: Vec<Vec<f64>>, // [lng, lat]
    }

    impl RouteProvider for OsrmRouteProvider {
        fn route(&self, from: &Location, to: &Location) -> Option<RouteResult> {
            let url = format!(
                "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
                self.endpoint, from.lng, from.lat, to.lng, to.lat,
            );

            let resp: OsrmResponse = match self.client.get(&url).send() {
                Ok(r) => match r.json() {
                    Ok(j) => j,
                    Err(err) => {
                        tracing::debug!(error = %err, "malformed OSRM response");
                        return None;
                    }
                },
                Err(err) => {
                    tracing::debug!(error = %err, "OSRM request failed");
                    return None;
                }
            };

            if resp.code != "Ok" {
                return None;
            }
            let route = resp.routes?.into_iter().next()?;

            let waypoints: Vec<(f64, f64)> = route
                .geometry
                .coordinates
                .iter()
                .filter(|c| c.len() >= 2)
                .map(|c| (c[1], c[0]))
                .collect();

            Some(RouteResult {
                waypoints,
                distance_km: route.distance / 1000.0,
                duration_secs: route.duration,
            })
        }
    }
}

type RouteKey = (u64, u64, u64, u64);

fn route_key(from: &Location, to: &Location) -> RouteKey {
    (
        from.lat.to_bits(),
        from.lng.to_bits(),
        to.lat.to_bits(),
        to.lng.to_bits(),
    )
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// The key is the directional coordinate pair. When the inner provider fails
/// and `fallback_to_straight_line` is set, a straight segment is returned and
/// cached instead.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<RouteKey, RouteResult>>,
    fallback_to_straight_line: bool,
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize, fallback_to_straight_line: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            fallback_to_straight_line,
        }
    }

    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(&self, from: &Location, to: &Location) -> Option<RouteResult> {
        let key = route_key(from, to);

        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(&key) {
                return Some(cached.clone());
            }
        }

        let result = self.inner.route(from, to).or_else(|| {
            if self.fallback_to_straight_line {
                StraightLineRouteProvider.route(from, to)
            } else {
                None
            }
        })?;

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, result.clone());
        Some(result)
    }
}

/// Provider for `kind`, cached. An OSRM client that cannot be built falls back
/// to straight lines.
pub fn build_route_provider(kind: &RouteProviderKind) -> Arc<dyn RouteProvider> {
    let inner: Box<dyn RouteProvider> = match kind {
        RouteProviderKind::StraightLine => Box::new(StraightLineRouteProvider),
        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => match osrm::OsrmRouteProvider::new(endpoint) {
            Ok(provider) => Box::new(provider),
            Err(err) => {
                tracing::warn!(error = %err, "OSRM client unavailable; using straight lines");
                Box::new(StraightLineRouteProvider)
            }
        },
    };
    Arc::new(CachedRouteProvider::new(inner, 5_000, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
        answer: bool,
    }

    impl RouteProvider for Counting {
        fn route(&self, from: &Location, to: &Location) -> Option<RouteResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.answer {
                return None;
            }
            Some(RouteResult {
                waypoints: vec![from.as_lat_lng(), (0.5, 0.5), to.as_lat_lng()],
                distance_km: 1.0,
                duration_secs: 60.0,
            })
        }
    }

    fn loc(lat: f64, lng: f64) -> Location {
        Location::new(lat, lng).expect("valid")
    }

    #[test]
    fn cache_serves_repeat_queries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedRouteProvider::new(
            Box::new(Counting {
                calls: Arc::clone(&calls),
                answer: true,
            }),
            8,
            false,
        );
        let a = provider.route(&loc(0.0, 0.0), &loc(1.0, 1.0)).expect("route");
        let b = provider.route(&loc(0.0, 0.0), &loc(1.0, 1.0)).expect("route");
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        provider.route(&loc(1.0, 1.0), &loc(0.0, 0.0)).expect("route");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "key is directional");
        assert_eq!(provider.len(), 2);
    }

    #[test]
    fn failed_inner_falls_back_to_straight_line() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedRouteProvider::new(
            Box::new(Counting {
                calls: Arc::clone(&calls),
                answer: false,
            }),
            8,
            true,
        );
        let route = provider.route(&loc(0.0, 0.0), &loc(0.0, 1.0)).expect("fallback");
        assert_eq!(route.waypoints.len(), 2);
        assert!((route.distance_km - 111.19).abs() < 0.1);

        let strict = CachedRouteProvider::new(
            Box::new(Counting {
                calls,
                answer: false,
            }),
            8,
            false,
        );
        assert!(strict.route(&loc(0.0, 0.0), &loc(0.0, 1.0)).is_none());
    }
}
