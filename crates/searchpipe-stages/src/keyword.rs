//! Multi-field text match against the backend.
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::debug;

use searchpipe_core::error::{Error, Result};
use searchpipe_core::traits::SearchBackend;
use searchpipe_core::types::{Context, Metadata, ResultSet};

use crate::config::KeywordSearchConfig;
use crate::search::{context_filters, elapsed_ms, into_result_set, is_unit_boost};

pub struct KeywordSearchStage {
    config: KeywordSearchConfig,
    backend: Arc<dyn SearchBackend>,
    collection: String,
}

impl KeywordSearchStage {
    pub fn new(config: KeywordSearchConfig, backend: Arc<dyn SearchBackend>, collection: impl Into<String>) -> Self {
        Self { config, backend, collection: collection.into() }
    }

    pub fn config(&self) -> &KeywordSearchConfig {
        &self.config
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Build the structured query body.
    ///
    /// The match clause is wrapped in a multiplicative `function_score` when
    /// `boost != 1.0`, and ANDed with `context["filters"]` when present.
    pub fn build_query(&self, query: &str, context: Option<&Context>) -> Value {
        let mut multi_match = json!({
            "query": query,
            "fields": self.config.fields,
            "type": "best_fields",
            "operator": self.config.operator.as_str(),
        });
        if let Some(msm) = &self.config.minimum_should_match {
            multi_match["minimum_should_match"] = json!(msm);
        }
        if let Some(fuzziness) = &self.config.fuzziness {
            multi_match["fuzziness"] = json!(fuzziness);
        }

        let mut clause = json!({ "multi_match": multi_match });
        if !is_unit_boost(self.config.boost) {
            clause = json!({
                "function_score": {
                    "query": clause,
                    "boost": self.config.boost,
                    "boost_mode": "multiply",
                }
            });
        }
        if let Some(filters) = context_filters(context) {
            clause = json!({ "bool": { "must": clause, "filter": filters } });
        }
        json!({ "query": clause, "size": self.config.size })
    }

    pub async fn execute(&self, query: &str, context: Option<&Context>) -> Result<ResultSet> {
        let start = Instant::now();
        let body = self.build_query(query, context);
        let response = self.backend.query(&self.collection, &body).await.map_err(Error::Backend)?;
        debug!(collection = %self.collection, hits = response.hits.len(), "keyword search answered");

        let mut metadata = Metadata::new();
        metadata.insert("stage_type".into(), json!("keyword_search"));
        metadata.insert("query".into(), json!(query));
        let mut result = into_result_set(response, &self.collection, self.config.size, metadata);
        result.elapsed_ms = Some(elapsed_ms(start));
        Ok(result)
    }
}
