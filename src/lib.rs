//! placerank - location recommendation for foreign residents
//!
//! This library implements the recommendation scoring pipeline:
//! - Free-text query classification into a closed category set
//! - Category filtering over an in-memory POI corpus
//! - Haversine distance scoring with min-max normalization
//! - Batched LLM specificity scoring with layered fallbacks
//! - Weighted ranking (specificity-dominant by design)

pub mod classify;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod geo;
pub mod logging;
pub mod rank;
pub mod scoring;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::corpus::{Coordinates, CorpusStore, Poi};
pub use crate::engine::{Recommendation, RecommendEngine};
pub use crate::error::{RecommendError, RecommendResult};
pub use crate::geo::ScoredPoi;
