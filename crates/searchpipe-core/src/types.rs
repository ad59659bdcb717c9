//! Result types produced by stages and by a whole pipeline execution.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub type DocId = String;
pub type Payload = Map<String, Value>;
pub type Metadata = Map<String, Value>;

/// Per-request context handed to every stage. Search stages read structured
/// filters from the `filters` key.
pub type Context = Map<String, Value>;

/// One ranked document.
///
/// - `id`: backend document identifier, unique within a `ResultSet`
/// - `score`: stage-specific, higher is better
/// - `rank`: dense 1-based position assigned by the producing stage
/// - `payload`: stored document fields as returned by the backend
/// - `source_collection`: collection the hit came from, when known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: DocId,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_collection: Option<String>,
}

impl ResultItem {
    pub fn new(id: impl Into<DocId>, score: f64) -> Self {
        Self { id: id.into(), score, rank: None, payload: Payload::new(), source_collection: None }
    }

    #[must_use]
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.source_collection = Some(collection.into());
        self
    }
}

/// Output of exactly one stage execution. Treated as a value: stages that
/// transform a set build a new one instead of editing their input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
    /// May exceed `items.len()` when the backend truncated its answer.
    pub total_matched: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ResultSet {
    /// A set whose `total_matched` equals its length.
    pub fn new(items: Vec<ResultItem>) -> Self {
        let total_matched = items.len() as u64;
        Self { items, total_matched, elapsed_ms: None, metadata: Metadata::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ResultItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// The `stage_type` recorded by the producing stage, or `"unknown"`.
    pub fn stage_type(&self) -> &str {
        self.metadata.get("stage_type").and_then(Value::as_str).unwrap_or("unknown")
    }
}

/// Reassign ranks 1..=n following the current order of `items`.
pub fn assign_dense_ranks(items: &mut [ResultItem]) {
    for (idx, item) in items.iter_mut().enumerate() {
        item.rank = Some(u32::try_from(idx + 1).unwrap_or(u32::MAX));
    }
}

/// Stable descending sort by score. Ties keep their current relative order.
pub fn sort_by_score_desc(items: &mut [ResultItem]) {
    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// A single hit as reported by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHit {
    pub id: DocId,
    pub score: f64,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub collection: Option<String>,
    /// 0-based position in the backend's returned order.
    pub position: usize,
}

/// Answer to one structured query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub hits: Vec<BackendHit>,
    #[serde(default)]
    pub total_matched: Option<u64>,
    #[serde(default)]
    pub backend_elapsed_ms: Option<f64>,
}

/// Everything produced by one pipeline execution. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub pipeline_id: String,
    pub query: String,
    pub final_result: ResultSet,
    /// One entry per executed stage, in execution order.
    pub stage_results: Vec<ResultSet>,
    pub total_elapsed_ms: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ExecutionResult {
    /// Response-shaped view: final hits plus per-stage timings.
    pub fn summary(&self) -> Value {
        let hits: Vec<Value> = self
            .final_result
            .items
            .iter()
            .map(|hit| json!({ "id": hit.id, "score": hit.score, "rank": hit.rank, "payload": hit.payload }))
            .collect();
        let timings: Vec<Value> = self
            .stage_results
            .iter()
            .map(|r| json!({ "stage_type": r.stage_type(), "elapsed_ms": r.elapsed_ms }))
            .collect();
        let mut metadata = self.metadata.clone();
        metadata.insert("num_stages".into(), json!(self.stage_results.len()));
        metadata.insert("stage_timings".into(), Value::Array(timings));
        json!({
            "pipeline_id": self.pipeline_id,
            "query": self.query,
            "hits": hits,
            "total": self.final_result.total_matched,
            "took_ms": self.total_elapsed_ms,
            "metadata": metadata,
        })
    }
}
