#![allow(dead_code)]
//! Scripted `SearchBackend` double that also records when each query starts
//! and finishes, so tests can observe overlap.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use searchpipe_core::pipeline::{PipelineDefinition, StageConfig, StageKind};
use searchpipe_core::traits::SearchBackend;
use searchpipe_core::types::{BackendHit, BackendResponse};

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub hits: Vec<BackendHit>,
    pub delay: Option<Duration>,
    pub failure: Option<String>,
}

impl Script {
    pub fn hits(hits: &[(&str, f64)]) -> Self {
        let hits = hits
            .iter()
            .enumerate()
            .map(|(position, (id, score))| BackendHit {
                id: (*id).to_string(),
                score: *score,
                payload: Map::new(),
                collection: None,
                position,
            })
            .collect();
        Self { hits, ..Self::default() }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    pub fn failing(message: &str) -> Self {
        Self { failure: Some(message.to_string()), ..Self::default() }
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    events: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, collection: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(collection.to_string(), script);
        self
    }

    /// `start:<collection>` / `end:<collection>` in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.events().iter().filter(|e| e.starts_with("start:")).count()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn query(&self, collection: &str, _body: &Value) -> anyhow::Result<BackendResponse> {
        let script = self.scripts.lock().unwrap().get(collection).cloned().unwrap_or_default();
        self.events.lock().unwrap().push(format!("start:{collection}"));
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        self.events.lock().unwrap().push(format!("end:{collection}"));
        if let Some(message) = script.failure {
            anyhow::bail!(message);
        }
        Ok(BackendResponse { hits: script.hits, total_matched: None, backend_elapsed_ms: None })
    }
}

pub fn keyword(index: &str) -> StageConfig {
    StageConfig::new(StageKind::KeywordSearch, json!({ "fields": ["title"], "index": index }))
}

pub fn vector(index: &str) -> StageConfig {
    StageConfig::new(StageKind::VectorSearch, json!({ "field": "embedding", "index": index }))
}

pub fn merge(strategy: &str) -> StageConfig {
    StageConfig::new(StageKind::Merge, json!({ "strategy": strategy }))
}

pub fn rerank(field: &str, weight: f64) -> StageConfig {
    StageConfig::new(StageKind::Rerank, json!({ "boost_by_field": field, "weight": weight }))
}

pub fn pipeline(id: &str, stages: Vec<StageConfig>) -> PipelineDefinition {
    PipelineDefinition::new(id, format!("{id} pipeline"), stages)
}
