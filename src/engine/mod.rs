use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify::{BayesClassifier, CategoryClassifier};
use crate::config::AppConfig;
use crate::corpus::{Coordinates, CorpusStore};
use crate::error::RecommendResult;
use crate::geo::{score_distances, ScoredPoi};
use crate::rank::{apply_radius_cutoff, combine_scores, rank, truncate, Weights};
use crate::scoring::{gemini::GeminiBackend, ScoreBackend, SpecificityScorer};

/// Ranked response for one recommendation request
#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub request_id: Uuid,
    /// Predicted category label, present even when results are empty so the
    /// caller can render "no matches for this category"
    pub category: String,
    pub confidence: f64,
    /// Wall-clock time for the whole request; dominated by batch scoring
    pub elapsed_ms: u64,
    pub results: Vec<ScoredPoi>,
}

/// Recommendation pipeline orchestrator.
///
/// Classifier and scoring backend are injected at construction so both can
/// be substituted with test doubles.
pub struct RecommendEngine {
    corpus: Arc<CorpusStore>,
    classifier: Arc<dyn CategoryClassifier>,
    scorer: SpecificityScorer,
    weights: Weights,
    top_n: usize,
    max_radius_km: Option<f64>,
}

impl RecommendEngine {
    /// Wire the engine from explicit dependencies
    pub fn new(
        config: &AppConfig,
        corpus: Arc<CorpusStore>,
        classifier: Arc<dyn CategoryClassifier>,
        backend: Option<Arc<dyn ScoreBackend>>,
    ) -> Self {
        check_label_alignment(&corpus, classifier.as_ref());

        Self {
            corpus,
            classifier,
            scorer: SpecificityScorer::new(backend, &config.scoring),
            weights: Weights::from(&config.ranking),
            top_n: config.ranking.top_n,
            max_radius_km: config.ranking.max_radius_km,
        }
    }

    /// Build the production engine: corpus from the configured CSV,
    /// classifier artifact from disk, Gemini backend when a key is set
    pub fn from_config(config: &AppConfig) -> RecommendResult<Self> {
        info!("Initializing recommendation engine");

        let corpus = Arc::new(CorpusStore::from_file(&config.corpus.path)?);
        info!("Corpus store initialized ({} POIs)", corpus.len());

        let classifier: Arc<dyn CategoryClassifier> =
            Arc::new(BayesClassifier::load(&config.classifier.model_dir)?);
        info!("Category classifier initialized");

        let backend: Option<Arc<dyn ScoreBackend>> = GeminiBackend::from_config(&config.scoring)?
            .map(|b| Arc::new(b) as Arc<dyn ScoreBackend>);
        if backend.is_none() {
            warn!("No scoring API key configured; requests will rank by distance only");
        }

        Ok(Self::new(config, corpus, classifier, backend))
    }

    /// Run the full pipeline: classify, filter, score distances, score
    /// specificity in batches, combine, rank, truncate.
    ///
    /// Classification failure is the only error surfaced to the caller;
    /// every scoring failure downstream degrades to default scores.
    pub async fn recommend(
        &self,
        query: &str,
        lat: f64,
        lng: f64,
    ) -> RecommendResult<Recommendation> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%request_id, query, lat, lng, "Recommendation request received");

        // 1. Classify the query into a category label
        let prediction = self.classifier.classify(query)?;
        info!(
            %request_id,
            category = %prediction.label,
            confidence = prediction.confidence,
            "Query classified"
        );

        // 2. Filter the corpus against a pinned snapshot; an empty filter is
        // a valid outcome, not an error. The snapshot is held for the whole
        // request so a concurrent reload cannot mix rows into this ranking.
        let snapshot = self.corpus.snapshot();
        let filtered = snapshot.filter_by_category(&prediction.label);
        if filtered.is_empty() {
            info!(%request_id, category = %prediction.label, "No corpus matches for category");
            return Ok(Recommendation {
                request_id,
                category: prediction.label,
                confidence: prediction.confidence,
                elapsed_ms: started.elapsed().as_millis() as u64,
                results: Vec::new(),
            });
        }
        info!(%request_id, matches = filtered.len(), "Corpus filtered");

        // 3. Distance scoring drops POIs without usable coordinates
        let user = Coordinates { lat, lng };
        let mut scored = score_distances(user, filtered);

        // 4. Batched specificity scoring; infallible by fallback policy
        self.scorer
            .score(query, &prediction.label, &mut scored)
            .await;

        // 5. Combine, rank, truncate
        let mut results = apply_radius_cutoff(scored, self.max_radius_km);
        combine_scores(&mut results, self.weights);
        rank(&mut results);
        truncate(&mut results, self.top_n);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(%request_id, results = results.len(), elapsed_ms, "Recommendation completed");

        Ok(Recommendation {
            request_id,
            category: prediction.label,
            confidence: prediction.confidence,
            elapsed_ms,
            results,
        })
    }

    /// Replace the corpus snapshot from its file; in-flight requests finish
    /// against the old snapshot
    pub fn reload_corpus<P: AsRef<Path>>(&self, path: P) -> RecommendResult<()> {
        self.corpus.reload_from_file(path)
    }

    /// Shared corpus handle, mainly for tooling and tests
    pub fn corpus(&self) -> &Arc<CorpusStore> {
        &self.corpus
    }
}

/// Diagnostics for drift between the classifier's closed label set and the
/// corpus category columns. Neither direction is fatal: an unknown corpus
/// column can never be selected, an uncovered label just filters to empty.
fn check_label_alignment(corpus: &CorpusStore, classifier: &dyn CategoryClassifier) {
    let snapshot = corpus.snapshot();
    let corpus_labels: HashSet<&str> = snapshot.categories().map(|(label, _)| label).collect();

    for label in classifier.labels() {
        if !corpus_labels.contains(label.as_str()) {
            warn!("Classifier label '{}' has no corpus category column", label);
        }
    }
    for label in &corpus_labels {
        if !classifier.labels().iter().any(|l| l == label) {
            warn!("Corpus category column '{}' is outside the classifier label set", label);
        }
    }
}
