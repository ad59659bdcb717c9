//! Typed per-stage configuration parsed from a stage's parameter mapping.
//!
//! Keys are snake_case; the camelCase spellings used by older definitions are
//! accepted as aliases. Unrecognised keys (e.g. `index`, read by the factory)
//! are ignored.

use std::collections::HashMap;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use searchpipe_core::error::{Error, Result};
use searchpipe_core::pipeline::StageKind;

/// Deserialize a stage's parameters, reporting failures as `InvalidConfig`.
pub fn parse_params<T: DeserializeOwned>(kind: StageKind, params: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| Error::InvalidConfig(format!("{kind} parameters: {e}")))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[serde(alias = "AND")]
    And,
    #[default]
    #[serde(alias = "OR")]
    Or,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// `"75%"`, `"AUTO"` or a plain integer, passed to the backend untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSearchConfig {
    /// Field names, optionally weighted as `name^weight`.
    pub fields: Vec<String>,
    pub operator: Operator,
    #[serde(alias = "minimumShouldMatch", skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<TextOrNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<TextOrNumber>,
    pub boost: f64,
    #[serde(alias = "limit")]
    pub size: usize,
}

impl Default for KeywordSearchConfig {
    fn default() -> Self {
        Self {
            fields: vec!["*".to_string()],
            operator: Operator::Or,
            minimum_should_match: None,
            fuzziness: None,
            boost: 1.0,
            size: 10,
        }
    }
}

impl KeywordSearchConfig {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let config: Self = parse_params(StageKind::KeywordSearch, params)?;
        if config.fields.is_empty() {
            return Err(Error::InvalidConfig("keyword_search parameters: fields must not be empty".into()));
        }
        Ok(config)
    }
}

fn default_k() -> usize {
    10
}

fn default_num_candidates() -> usize {
    100
}

fn default_boost() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchConfig {
    /// Dense vector field to search.
    pub field: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_num_candidates", alias = "numCandidates")]
    pub num_candidates: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<String>,
    #[serde(default = "default_boost")]
    pub boost: f64,
}

impl VectorSearchConfig {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), k: default_k(), num_candidates: default_num_candidates(), similarity: None, boost: 1.0 }
    }

    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let config: Self = parse_params(StageKind::VectorSearch, params)?;
        if config.field.is_empty() {
            return Err(Error::InvalidConfig("vector_search parameters: field must not be empty".into()));
        }
        if config.k == 0 {
            return Err(Error::InvalidConfig("vector_search parameters: k must be > 0".into()));
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Reciprocal Rank Fusion.
    #[default]
    Rrf,
    Weighted,
    Concatenate,
    Interleave,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rrf => "rrf",
            Self::Weighted => "weighted",
            Self::Concatenate => "concatenate",
            Self::Interleave => "interleave",
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rrf" => Ok(Self::Rrf),
            "weighted" => Ok(Self::Weighted),
            "concatenate" => Ok(Self::Concatenate),
            "interleave" => Ok(Self::Interleave),
            other => Err(Error::UnknownMergeStrategy(other.to_string())),
        }
    }
}

pub const DEFAULT_RRF_K: f64 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub strategy: MergeStrategy,
    /// Weight per input index, keyed by the index's string form.
    pub weights: HashMap<String, f64>,
    pub k: f64,
    pub max_results: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { strategy: MergeStrategy::Rrf, weights: HashMap::new(), k: DEFAULT_RRF_K, max_results: 10 }
    }
}

// Strategy is read as a string so an unknown name surfaces as
// `UnknownMergeStrategy` rather than a serde error.
#[derive(Deserialize)]
#[serde(default)]
struct MergeParams {
    strategy: String,
    weights: Option<HashMap<String, f64>>,
    k: f64,
    #[serde(alias = "maxResults")]
    max_results: usize,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self { strategy: "rrf".into(), weights: None, k: DEFAULT_RRF_K, max_results: 10 }
    }
}

impl MergeConfig {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self { strategy, ..Self::default() }
    }

    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let raw: MergeParams = parse_params(StageKind::Merge, params)?;
        let strategy = raw.strategy.parse()?;
        if !raw.k.is_finite() || raw.k < 0.0 {
            return Err(Error::InvalidConfig(format!("merge parameters: k must be a non-negative number, got {}", raw.k)));
        }
        Ok(Self { strategy, weights: raw.weights.unwrap_or_default(), k: raw.k, max_results: raw.max_results })
    }

    /// Weight for input `index`, 1.0 when not configured.
    pub fn weight_for(&self, index: usize) -> f64 {
        self.weights.get(&index.to_string()).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    #[serde(alias = "boostByField", skip_serializing_if = "Option::is_none")]
    pub boost_by_field: Option<String>,
    pub weight: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { boost_by_field: None, weight: 1.0 }
    }
}

impl RerankConfig {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        parse_params(StageKind::Rerank, params)
    }
}
