//! Prompt construction for the batch scoring call
use crate::scoring::BatchItem;

/// Build the batch scoring prompt: the query, the shared category context,
/// and the batch as a JSON list, with a strict JSON-only output contract.
pub fn build_batch_scoring_prompt(query: &str, category: &str, items: &[BatchItem]) -> String {
    let items_json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a relevance-rating system for places.

[TASK]
Rate EVERY place in [PLACES] against the user [QUERY].
All places share the category context: "{category}".

[QUERY]
"{query}"

[PLACES]
{items_json}

[RATING RULES]
1. Extract the key attributes of the QUERY (nationality, proper names, function).
2. For EACH place, compare its "name" against those attributes.
3. Score from 0.0 (unrelated) to 1.0 (direct match).
   - 1.0: direct match (query mentions Indonesia, name is "Indonesian Consulate").
   - 0.5: same broad category, mismatched attribute (query mentions Indonesia, name is "Thai Consulate").
   - 0.1: unrelated.
4. Give a VERY short "reason" (at most 10 words) for each score.

[OUTPUT FORMAT - MANDATORY]
Reply with ONLY a JSON list. Each object must have exactly 3 keys:
1. "id" (same as the input "temp_id")
2. "score" (your rating)
3. "reason" (the short justification)

[EXAMPLE OUTPUT]
[
  {{"id": 0, "score": 0.9, "reason": "Matches Indonesia"}},
  {{"id": 1, "score": 0.2, "reason": "Wrong country (Thailand)"}}
]

BEGIN:
"#
    )
}
