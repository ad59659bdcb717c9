//! Score adjustment from document fields.
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, warn};

use searchpipe_core::error::{Error, Result};
use searchpipe_core::types::{assign_dense_ranks, sort_by_score_desc, Metadata, ResultSet};

use crate::config::RerankConfig;

pub struct RerankStage {
    config: RerankConfig,
}

impl RerankStage {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Rerank the last input set. Earlier inputs are ignored; put a merge
    /// stage in front to rerank a fusion of several sets.
    ///
    /// With `boost_by_field`, each score becomes `score × (1 + weight × value)`
    /// where `value` is the numeric payload field; items without a numeric
    /// value keep their score. The result is always re-sorted by score and
    /// re-ranked densely from 1.
    pub fn execute(&self, inputs: &[ResultSet]) -> Result<ResultSet> {
        let Some(last) = inputs.last() else {
            return Err(Error::InvalidInput("rerank requires at least one input result set".into()));
        };
        if inputs.len() > 1 {
            warn!(ignored = inputs.len() - 1, "rerank uses only the last input");
        }
        let start = Instant::now();
        let mut items = last.items.clone();

        if let Some(field) = &self.config.boost_by_field {
            let mut boosted = 0usize;
            for item in &mut items {
                if let Some(value) = item.payload.get(field).and_then(Value::as_f64) {
                    item.score *= 1.0 + self.config.weight * value;
                    boosted += 1;
                }
            }
            debug!(field = %field, boosted, total = items.len(), "boosted by field");
        }
        sort_by_score_desc(&mut items);
        assign_dense_ranks(&mut items);

        let mut metadata = Metadata::new();
        metadata.insert("stage_type".into(), json!("rerank"));
        metadata.insert("original_elapsed_ms".into(), json!(last.elapsed_ms));
        metadata.insert("ignored_inputs".into(), json!(inputs.len() - 1));
        Ok(ResultSet {
            items,
            total_matched: last.total_matched,
            elapsed_ms: Some(start.elapsed().as_secs_f64() * 1000.0),
            metadata,
        })
    }
}
