use std::time::Instant;

use serde_json::{json, Value};

use searchpipe_core::types::{BackendResponse, Context, Metadata, ResultItem, ResultSet};

/// Structured filters supplied by the caller under `context["filters"]`.
pub(crate) fn context_filters(context: Option<&Context>) -> Option<&Value> {
    context.and_then(|c| c.get("filters")).filter(|f| !f.is_null())
}

pub(crate) fn is_unit_boost(boost: f64) -> bool {
    (boost - 1.0).abs() < f64::EPSILON
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Convert a backend answer into a ranked result set, keeping the backend's
/// order and at most `limit` hits.
pub(crate) fn into_result_set(
    mut response: BackendResponse,
    collection: &str,
    limit: usize,
    mut metadata: Metadata,
) -> ResultSet {
    response.hits.sort_by_key(|h| h.position);
    response.hits.truncate(limit);
    let items: Vec<ResultItem> = response
        .hits
        .into_iter()
        .enumerate()
        .map(|(idx, hit)| ResultItem {
            id: hit.id,
            score: hit.score,
            rank: Some(u32::try_from(idx + 1).unwrap_or(u32::MAX)),
            payload: hit.payload,
            source_collection: Some(hit.collection.unwrap_or_else(|| collection.to_string())),
        })
        .collect();
    let total_matched = response.total_matched.unwrap_or(items.len() as u64);
    metadata.insert("backend_took_ms".into(), json!(response.backend_elapsed_ms));
    ResultSet { items, total_matched, elapsed_ms: None, metadata }
}
