#![allow(dead_code)]
//! Scripted `SearchBackend` double: canned answers per collection, optional
//! latency or failure, and a log of every call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use searchpipe_core::traits::SearchBackend;
use searchpipe_core::types::{BackendHit, BackendResponse, ResultItem, ResultSet};

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub hits: Vec<BackendHit>,
    pub total: Option<u64>,
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

    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    pub fn failing(message: &str) -> Self {
        Self { failure: Some(message.to_string()), ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub collection: String,
    pub body: Value,
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, collection: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(collection.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn query(&self, collection: &str, body: &Value) -> anyhow::Result<BackendResponse> {
        let script = self.scripts.lock().unwrap().get(collection).cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(Call { collection: collection.to_string(), body: body.clone() });
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = script.failure {
            anyhow::bail!(message);
        }
        Ok(BackendResponse { hits: script.hits, total_matched: script.total, backend_elapsed_ms: Some(1.0) })
    }
}

/// A result set whose items are ranked 1..=n in the given order.
pub fn ranked(items: &[(&str, f64)]) -> ResultSet {
    ResultSet::new(
        items
            .iter()
            .enumerate()
            .map(|(idx, (id, score))| ResultItem::new(*id, *score).with_rank(idx as u32 + 1))
            .collect(),
    )
}
