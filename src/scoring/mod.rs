use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::error::RecommendResult;
use crate::geo::ScoredPoi;

pub mod gemini;
pub mod prompt;

/// Neutral fallback used when a batch cannot be trusted
pub const NEUTRAL_SCORE: f64 = 0.5;

/// One POI submitted to the backend. `temp_id` is a 0-based index local to
/// the batch, not the corpus id, so response addressing stays independent of
/// corpus identity.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub temp_id: usize,
    pub name: String,
}

/// One entry of a backend response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScore {
    pub id: usize,
    pub score: f64,
    pub reason: String,
}

/// External scoring call. Treated as an unreliable network boundary: any
/// error from here is absorbed by the scorer's fallback policy.
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    /// Rate how specifically each item's name matches the query, within the
    /// given category. Must cover every temp_id in `items` on success.
    async fn score_batch(
        &self,
        query: &str,
        category: &str,
        items: &[BatchItem],
    ) -> RecommendResult<Vec<BatchScore>>;
}

/// Batched specificity scoring with a defined degradation ladder:
/// no backend → 1.0 everywhere (pure distance ranking); failed or misaligned
/// batch → 0.5 for that batch only; invalid entry id → that POI keeps the
/// pre-seeded 0.5.
pub struct SpecificityScorer {
    backend: Option<Arc<dyn ScoreBackend>>,
    batch_size: usize,
    cooldown: Duration,
    deadline: Option<Duration>,
}

impl SpecificityScorer {
    pub fn new(backend: Option<Arc<dyn ScoreBackend>>, config: &ScoringConfig) -> Self {
        Self {
            backend,
            batch_size: config.batch_size.max(1),
            cooldown: Duration::from_secs(config.cooldown_seconds),
            deadline: config.request_deadline_seconds.map(Duration::from_secs),
        }
    }

    /// Whether a scoring backend is configured
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Score every POI in place. Never fails: all failure modes degrade to
    /// default scores so the pipeline always completes.
    pub async fn score(&self, query: &str, category: &str, pois: &mut [ScoredPoi]) {
        if pois.is_empty() {
            return;
        }

        let Some(backend) = &self.backend else {
            info!("Scoring backend unavailable, degrading to pure distance ranking");
            for poi in pois.iter_mut() {
                poi.spec_score = 1.0;
                poi.spec_reason = "backend unavailable".to_string();
            }
            return;
        };

        let started = Instant::now();
        let total_batches = pois.len().div_ceil(self.batch_size);
        debug!(
            "Scoring {} POIs in {} batches of up to {}",
            pois.len(),
            total_batches,
            self.batch_size
        );

        let mut deadline_hit = false;
        for (batch_idx, batch) in pois.chunks_mut(self.batch_size).enumerate() {
            // Pre-seed the neutral default: entries the response fails to
            // cover keep this value.
            for poi in batch.iter_mut() {
                poi.spec_score = NEUTRAL_SCORE;
                poi.spec_reason = "awaiting batch score".to_string();
            }

            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    if !deadline_hit {
                        warn!(
                            "Scoring deadline of {:?} reached at batch {}/{}; remaining POIs keep neutral scores",
                            deadline,
                            batch_idx + 1,
                            total_batches
                        );
                        deadline_hit = true;
                    }
                    for poi in batch.iter_mut() {
                        poi.spec_reason = "request deadline exceeded".to_string();
                    }
                    continue;
                }
            }

            debug!("Scoring batch {}/{} (size: {})", batch_idx + 1, total_batches, batch.len());
            let items: Vec<BatchItem> = batch
                .iter()
                .enumerate()
                .map(|(i, poi)| BatchItem {
                    temp_id: i,
                    name: poi.poi.name.clone(),
                })
                .collect();

            match backend.score_batch(query, category, &items).await {
                Ok(results) => apply_batch_results(batch, results, batch_idx),
                Err(e) => {
                    warn!("Scoring batch {}/{} failed: {}", batch_idx + 1, total_batches, e);
                    for poi in batch.iter_mut() {
                        poi.spec_score = NEUTRAL_SCORE;
                        poi.spec_reason = format!("scoring call failed: {}", e.category());
                    }
                }
            }

            // Fixed pause between batches to respect external rate limits;
            // no cooldown after the final batch.
            if batch_idx + 1 < total_batches && !self.cooldown.is_zero() {
                tokio::time::sleep(self.cooldown).await;
            }
        }
    }
}

/// Map a successful backend response onto the batch. A response whose length
/// does not match the batch is untrustworthy as a whole and falls back to
/// neutral; an individual out-of-range id is skipped, leaving the pre-seeded
/// default for its POI.
fn apply_batch_results(batch: &mut [ScoredPoi], results: Vec<BatchScore>, batch_idx: usize) {
    if results.len() != batch.len() {
        warn!(
            "Batch {} returned {} entries for {} POIs; treating as failure",
            batch_idx + 1,
            results.len(),
            batch.len()
        );
        for poi in batch.iter_mut() {
            poi.spec_score = NEUTRAL_SCORE;
            poi.spec_reason = "batch result misaligned".to_string();
        }
        return;
    }

    for entry in results {
        if entry.id >= batch.len() {
            warn!(
                "Batch {} returned out-of-range id {}; entry skipped",
                batch_idx + 1,
                entry.id
            );
            continue;
        }
        batch[entry.id].spec_score = entry.score.clamp(0.0, 1.0);
        batch[entry.id].spec_reason = entry.reason;
    }
}
