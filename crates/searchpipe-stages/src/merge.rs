//! Result fusion.
//!
//! Every algorithm takes the input sets in pipeline order and returns items in
//! descending order of their computed score (or emission order for the
//! position-based strategies) with ranks reassigned densely from 1. Inputs are
//! never modified; output items are clones.
//!
//! For the score-based strategies the first input set to contribute an id
//! supplies that id's payload; the score is always recomputed. Ties keep
//! first-seen order across the input sequence.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde_json::json;
use tracing::{debug, instrument, warn};

use searchpipe_core::error::{Error, Result};
use searchpipe_core::types::{assign_dense_ranks, sort_by_score_desc, Metadata, ResultItem, ResultSet};

use crate::config::{MergeConfig, MergeStrategy};

/// Accumulates per-id scores while remembering first-seen order.
#[derive(Default)]
struct ScoreBoard {
    items: Vec<ResultItem>,
    index: HashMap<String, usize>,
}

impl ScoreBoard {
    fn add(&mut self, item: &ResultItem, contribution: f64) {
        if let Some(&slot) = self.index.get(&item.id) {
            self.items[slot].score += contribution;
        } else {
            let mut first = item.clone();
            first.score = contribution;
            self.index.insert(item.id.clone(), self.items.len());
            self.items.push(first);
        }
    }

    fn into_ranked(mut self) -> Vec<ResultItem> {
        sort_by_score_desc(&mut self.items);
        assign_dense_ranks(&mut self.items);
        self.items
    }
}

/// Reciprocal Rank Fusion: `score(id) = Σ 1 / (k + rank)` over every input in
/// which `id` carries a rank. Unranked items contribute nothing.
#[instrument(skip(inputs), fields(sources = inputs.len()))]
pub fn rrf(inputs: &[ResultSet], k: f64) -> Vec<ResultItem> {
    let mut board = ScoreBoard::default();
    let mut unranked = 0usize;
    for set in inputs {
        for item in &set.items {
            let Some(rank) = item.rank else {
                unranked += 1;
                continue;
            };
            board.add(item, 1.0 / (k + f64::from(rank)));
        }
    }
    if unranked > 0 {
        warn!(unranked, "rrf skipped items without a rank");
    }
    board.into_ranked()
}

/// Weighted score sum: input `i` contributes `score × weights[i]` (1.0 when
/// unset).
#[instrument(skip(inputs, config), fields(sources = inputs.len()))]
pub fn weighted(inputs: &[ResultSet], config: &MergeConfig) -> Vec<ResultItem> {
    let mut board = ScoreBoard::default();
    for (idx, set) in inputs.iter().enumerate() {
        let weight = config.weight_for(idx);
        for item in &set.items {
            board.add(item, item.score * weight);
        }
    }
    board.into_ranked()
}

/// Inputs joined in order. No deduplication, scores unchanged, ranks follow
/// the running position.
pub fn concatenate(inputs: &[ResultSet]) -> Vec<ResultItem> {
    let mut merged: Vec<ResultItem> = inputs.iter().flat_map(|s| s.items.iter().cloned()).collect();
    assign_dense_ranks(&mut merged);
    merged
}

/// Round-robin by position: pass `p` takes item `p` of every input in input
/// order. The first occurrence of an id wins and keeps its original score.
pub fn interleave(inputs: &[ResultSet]) -> Vec<ResultItem> {
    let longest = inputs.iter().map(ResultSet::len).max().unwrap_or(0);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::new();
    for position in 0..longest {
        for set in inputs {
            if let Some(item) = set.items.get(position) {
                if seen.insert(item.id.as_str()) {
                    merged.push(item.clone());
                }
            }
        }
    }
    assign_dense_ranks(&mut merged);
    merged
}

/// Dispatch to the configured strategy without truncation.
pub fn merge(inputs: &[ResultSet], config: &MergeConfig) -> Vec<ResultItem> {
    match config.strategy {
        MergeStrategy::Rrf => rrf(inputs, config.k),
        MergeStrategy::Weighted => weighted(inputs, config),
        MergeStrategy::Concatenate => concatenate(inputs),
        MergeStrategy::Interleave => interleave(inputs),
    }
}

pub struct MergeStage {
    config: MergeConfig,
}

impl MergeStage {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn execute(&self, inputs: &[ResultSet]) -> Result<ResultSet> {
        if inputs.is_empty() {
            return Err(Error::InvalidInput("merge requires at least one input result set".into()));
        }
        let start = Instant::now();
        let mut items = merge(inputs, &self.config);
        items.truncate(self.config.max_results);
        debug!(strategy = self.config.strategy.as_str(), sources = inputs.len(), kept = items.len(), "merged");

        let mut metadata = Metadata::new();
        metadata.insert("stage_type".into(), json!("merge"));
        metadata.insert("strategy".into(), json!(self.config.strategy.as_str()));
        metadata.insert("num_sources".into(), json!(inputs.len()));
        let mut result = ResultSet::new(items);
        result.metadata = metadata;
        result.elapsed_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
        Ok(result)
    }
}
