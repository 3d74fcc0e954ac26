use tracing::debug;

use crate::corpus::{Coordinates, Poi};

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers.
/// Symmetric, zero for identical points, monotonic in angular separation.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// A POI with its per-request computed scores. Transient: built fresh for
/// every recommendation and never written back to the corpus.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredPoi {
    #[serde(flatten)]
    pub poi: Poi,
    pub raw_distance_km: f64,
    /// Min-max normalized distance score in [0,1]; closer is higher
    pub distance_score: f64,
    pub spec_score: f64,
    pub spec_reason: String,
    pub total_score: f64,
}

/// Compute raw distances from the user position and min-max normalize them.
///
/// POIs without valid coordinates are dropped: an unscored POI cannot be
/// ranked by distance. When all survivors are equidistant the score is
/// defined as 1.0 for each, which also covers the single-POI case.
pub fn score_distances(user: Coordinates, pois: Vec<Poi>) -> Vec<ScoredPoi> {
    let mut scored: Vec<ScoredPoi> = Vec::with_capacity(pois.len());

    for poi in pois {
        let Some(coords) = poi.coords else {
            debug!("Dropping POI '{}' without coordinates", poi.name);
            continue;
        };
        let raw_distance_km = haversine_km(user, coords);
        scored.push(ScoredPoi {
            poi,
            raw_distance_km,
            distance_score: 0.0,
            spec_score: 0.0,
            spec_reason: String::new(),
            total_score: 0.0,
        });
    }

    if scored.is_empty() {
        return scored;
    }

    let min_dist = scored
        .iter()
        .map(|s| s.raw_distance_km)
        .fold(f64::INFINITY, f64::min);
    let max_dist = scored
        .iter()
        .map(|s| s.raw_distance_km)
        .fold(f64::NEG_INFINITY, f64::max);

    if (max_dist - min_dist).abs() < f64::EPSILON {
        for s in &mut scored {
            s.distance_score = 1.0;
        }
    } else {
        for s in &mut scored {
            s.distance_score = (max_dist - s.raw_distance_km) / (max_dist - min_dist);
        }
    }

    scored
}
