//! Approximate kNN search over a precomputed query embedding.
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::debug;

use searchpipe_core::error::{Error, Result};
use searchpipe_core::traits::SearchBackend;
use searchpipe_core::types::{Context, Metadata, ResultSet};

use crate::config::VectorSearchConfig;
use crate::search::{context_filters, elapsed_ms, into_result_set, is_unit_boost};

pub struct VectorSearchStage {
    config: VectorSearchConfig,
    backend: Arc<dyn SearchBackend>,
    collection: String,
}

impl VectorSearchStage {
    pub fn new(config: VectorSearchConfig, backend: Arc<dyn SearchBackend>, collection: impl Into<String>) -> Self {
        Self { config, backend, collection: collection.into() }
    }

    pub fn config(&self) -> &VectorSearchConfig {
        &self.config
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn build_query(&self, query_vector: &[f64], context: Option<&Context>) -> Value {
        let mut knn = json!({
            "field": self.config.field,
            "query_vector": query_vector,
            "k": self.config.k,
            "num_candidates": self.config.num_candidates,
        });
        if let Some(similarity) = &self.config.similarity {
            knn["similarity"] = json!(similarity);
        }
        if !is_unit_boost(self.config.boost) {
            knn["boost"] = json!(self.config.boost);
        }
        if let Some(filters) = context_filters(context) {
            knn["filter"] = filters.clone();
        }
        json!({ "knn": knn, "size": self.config.k })
    }

    pub async fn execute(&self, query: &str, query_vector: Option<&[f64]>, context: Option<&Context>) -> Result<ResultSet> {
        let query_vector = match query_vector {
            Some(v) if !v.is_empty() => v,
            _ => return Err(Error::InvalidInput("vector_search requires a non-empty query vector".into())),
        };
        let start = Instant::now();
        let body = self.build_query(query_vector, context);
        let response = self.backend.query(&self.collection, &body).await.map_err(Error::Backend)?;
        debug!(collection = %self.collection, dims = query_vector.len(), hits = response.hits.len(), "vector search answered");

        let mut metadata = Metadata::new();
        metadata.insert("stage_type".into(), json!("vector_search"));
        metadata.insert("query".into(), json!(query));
        metadata.insert("k".into(), json!(self.config.k));
        metadata.insert("num_candidates".into(), json!(self.config.num_candidates));
        let mut result = into_result_set(response, &self.collection, self.config.k, metadata);
        result.elapsed_ms = Some(elapsed_ms(start));
        Ok(result)
    }
}
