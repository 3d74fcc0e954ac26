use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;
use crate::geo::ScoredPoi;

/// Ranking weights. Specificity is the primary signal; distance breaks
/// ties. Validation enforces `alpha > beta` so a perfect category match
/// always dominates a perfect distance match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Weights {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { alpha: 0.8, beta: 0.2 }
    }
}

impl From<&RankingConfig> for Weights {
    fn from(config: &RankingConfig) -> Self {
        Self {
            alpha: config.alpha,
            beta: config.beta,
        }
    }
}

/// Set `total_score = alpha * spec + beta * dist` on every POI
pub fn combine_scores(pois: &mut [ScoredPoi], weights: Weights) {
    for poi in pois.iter_mut() {
        poi.total_score = weights.alpha * poi.spec_score + weights.beta * poi.distance_score;
    }
}

/// Stable sort descending by total score; equal scores keep their input
/// order, which keeps fixtures reproducible.
pub fn rank(pois: &mut [ScoredPoi]) {
    pois.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Drop POIs beyond the radius cutoff, when one is configured.
/// Applied before ranking so truncation never hides the cutoff.
pub fn apply_radius_cutoff(pois: Vec<ScoredPoi>, max_radius_km: Option<f64>) -> Vec<ScoredPoi> {
    match max_radius_km {
        Some(radius) => pois
            .into_iter()
            .filter(|p| p.raw_distance_km <= radius)
            .collect(),
        None => pois,
    }
}

/// Truncate to the top N results. Happens after sorting, never before.
pub fn truncate(pois: &mut Vec<ScoredPoi>, top_n: usize) {
    pois.truncate(top_n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Coordinates, Poi};
    use std::collections::HashSet;

    fn scored(name: &str, spec: f64, dist: f64, raw_km: f64) -> ScoredPoi {
        ScoredPoi {
            poi: Poi {
                id: 0,
                name: name.to_string(),
                address: String::new(),
                coords: Some(Coordinates { lat: 0.0, lng: 0.0 }),
                categories: HashSet::new(),
                phone: None,
                website: None,
                intro: None,
            },
            raw_distance_km: raw_km,
            distance_score: dist,
            spec_score: spec,
            spec_reason: String::new(),
            total_score: 0.0,
        }
    }

    #[test]
    fn test_perfect_scores_combine_to_one() {
        let mut pois = vec![scored("perfect", 1.0, 1.0, 0.1)];
        combine_scores(&mut pois, Weights::default());
        assert_eq!(pois[0].total_score, 1.0);
    }

    #[test]
    fn test_specificity_dominates_distance() {
        // A direct name match far away beats an unrelated name nearby
        let mut pois = vec![
            scored("Thai Consulate", 0.2, 1.0, 0.1),
            scored("Indonesian Consulate", 1.0, 0.0, 0.3),
        ];
        combine_scores(&mut pois, Weights::default());
        rank(&mut pois);

        assert_eq!(pois[0].poi.name, "Indonesian Consulate");
        assert!((pois[0].total_score - 0.8).abs() < 1e-12);
        assert!((pois[1].total_score - 0.36).abs() < 1e-12);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let mut pois = vec![
            scored("first", 0.5, 0.5, 1.0),
            scored("second", 0.5, 0.5, 1.0),
            scored("winner", 1.0, 1.0, 1.0),
            scored("third", 0.5, 0.5, 1.0),
        ];
        combine_scores(&mut pois, Weights::default());
        rank(&mut pois);

        assert_eq!(pois[0].poi.name, "winner");
        assert_eq!(pois[1].poi.name, "first");
        assert_eq!(pois[2].poi.name, "second");
        assert_eq!(pois[3].poi.name, "third");
    }

    #[test]
    fn test_truncate_after_sort() {
        let mut pois: Vec<ScoredPoi> = (0..15)
            .map(|i| scored(&format!("p{}", i), i as f64 / 15.0, 0.0, 1.0))
            .collect();
        combine_scores(&mut pois, Weights::default());
        rank(&mut pois);
        truncate(&mut pois, 10);

        assert_eq!(pois.len(), 10);
        assert_eq!(pois[0].poi.name, "p14");
    }

    #[test]
    fn test_radius_cutoff() {
        let pois = vec![
            scored("near", 0.5, 0.5, 2.0),
            scored("far", 0.5, 0.5, 50.0),
        ];
        let kept = apply_radius_cutoff(pois, Some(10.0));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].poi.name, "near");

        let pois = vec![scored("far", 0.5, 0.5, 50.0)];
        assert_eq!(apply_radius_cutoff(pois, None).len(), 1);
    }
}
