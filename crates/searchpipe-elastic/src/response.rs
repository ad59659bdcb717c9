use serde_json::{Map, Value};

use searchpipe_core::types::{BackendHit, BackendResponse};

use crate::client::ElasticError;

/// Map a `_search` response body to backend hits.
///
/// `hits.hits[]` keeps its order as the hit position. `_score` may be null
/// (e.g. for sorted queries) and is read as 0.0. `hits.total` is accepted as
/// either `{ "value": n }` or a bare number.
pub fn parse_search_response(body: &Value, collection: &str) -> Result<BackendResponse, ElasticError> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| ElasticError::Malformed(format!("{collection}: response has no hits.hits array")))?;

    let hits = hits
        .iter()
        .enumerate()
        .map(|(position, hit)| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ElasticError::Malformed(format!("{collection}: hit {position} has no _id")))?;
            let payload = match hit.get("_source") {
                Some(Value::Object(source)) => source.clone(),
                _ => Map::new(),
            };
            Ok(BackendHit {
                id: id.to_string(),
                score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
                payload,
                collection: hit.get("_index").and_then(Value::as_str).map(str::to_string),
                position,
            })
        })
        .collect::<Result<Vec<_>, ElasticError>>()?;

    let total_matched = match body.pointer("/hits/total") {
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
        Some(other) => other.as_u64(),
        None => None,
    };
    let backend_elapsed_ms = body.get("took").and_then(Value::as_f64);

    Ok(BackendResponse { hits, total_matched, backend_elapsed_ms })
}
