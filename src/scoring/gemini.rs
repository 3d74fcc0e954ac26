use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ScoringConfig;
use crate::error::{RecommendError, RecommendResult};
use crate::scoring::{prompt, BatchItem, BatchScore, ScoreBackend};

/// Gemini `generateContent` backend for batch specificity scoring.
///
/// The response is held to a strict schema: a JSON list of
/// `{id, score, reason}`. Any deviation is an error here and a
/// neutral-score fallback in the scorer.
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiBackend {
    /// Create a backend from config; `api_key` must be non-empty
    pub fn new(config: &ScoringConfig, api_key: String) -> RecommendResult<Self> {
        if api_key.trim().is_empty() {
            return Err(RecommendError::backend("empty API key"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RecommendError::backend(e.to_string()))?;

        info!("Gemini scoring backend configured (model: {})", config.model);

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Build from config, returning None when no key is configured so the
    /// scorer can degrade to pure distance ranking.
    pub fn from_config(config: &ScoringConfig) -> RecommendResult<Option<Self>> {
        match config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(Some(Self::new(config, key.to_string())?)),
            _ => Ok(None),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }
}

#[async_trait]
impl ScoreBackend for GeminiBackend {
    async fn score_batch(
        &self,
        query: &str,
        category: &str,
        items: &[BatchItem],
    ) -> RecommendResult<Vec<BatchScore>> {
        let prompt = prompt::build_batch_scoring_prompt(query, category, items);

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.request_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| RecommendError::backend(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecommendError::backend(format!(
                "scoring call returned HTTP {}",
                status
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| RecommendError::backend(format!("unreadable response body: {}", e)))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| RecommendError::backend("response has no candidates"))?;

        debug!("Scoring response text: {}", text);
        parse_scores(&text)
    }
}

/// Strip markdown fences and parse the strict `{id, score, reason}` list.
/// Scores are clamped to [0,1]; the calibration is directional, only the
/// induced ordering is contractual.
pub fn parse_scores(raw: &str) -> RecommendResult<Vec<BatchScore>> {
    static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\n?").unwrap());
    let cleaned = FENCE.replace_all(raw, "");
    let cleaned = cleaned.trim();

    let mut scores: Vec<BatchScore> = serde_json::from_str(cleaned)
        .map_err(|e| RecommendError::backend(format!("malformed score list: {}", e)))?;

    for entry in &mut scores {
        entry.score = entry.score.clamp(0.0, 1.0);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json_list() {
        let scores = parse_scores(
            r#"[{"id": 0, "score": 0.9, "reason": "Matches Indonesia"},
                {"id": 1, "score": 0.2, "reason": "Wrong country"}]"#,
        )
        .unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].id, 0);
        assert_eq!(scores[1].score, 0.2);
    }

    #[test]
    fn test_parse_strips_markdown_fences() {
        let raw = "```json\n[{\"id\": 0, \"score\": 1.0, \"reason\": \"direct match\"}]\n```";
        let scores = parse_scores(raw).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 1.0);
    }

    #[test]
    fn test_parse_clamps_out_of_range_scores() {
        let scores =
            parse_scores(r#"[{"id": 0, "score": 3.0, "reason": "x"}, {"id": 1, "score": -1.0, "reason": "y"}]"#)
                .unwrap();
        assert_eq!(scores[0].score, 1.0);
        assert_eq!(scores[1].score, 0.0);
    }

    #[test]
    fn test_parse_rejects_non_list() {
        assert!(parse_scores(r#"{"id": 0, "score": 1.0, "reason": "x"}"#).is_err());
        assert!(parse_scores("the places look fine to me").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        // Schema violations map to a backend error, which the scorer turns
        // into the neutral batch fallback.
        assert!(parse_scores(r#"[{"id": 0, "score": 1.0}]"#).is_err());
        assert!(parse_scores(r#"[{"score": 1.0, "reason": "x"}]"#).is_err());
    }

    #[test]
    fn test_backend_requires_key() {
        let config = ScoringConfig {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            batch_size: 20,
            cooldown_seconds: 3,
            request_timeout_seconds: 30,
            request_deadline_seconds: None,
        };
        assert!(GeminiBackend::new(&config, String::new()).is_err());
        assert!(GeminiBackend::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_request_url_shape() {
        let config = ScoringConfig {
            api_key: Some("k".to_string()),
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
            batch_size: 20,
            cooldown_seconds: 3,
            request_timeout_seconds: 30,
            request_deadline_seconds: None,
        };
        let backend = GeminiBackend::from_config(&config).unwrap().unwrap();
        assert_eq!(
            backend.request_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?key=k"
        );
    }
}
