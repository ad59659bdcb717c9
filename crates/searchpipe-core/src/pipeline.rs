//! Declarative pipeline definitions.
//!
//! A `PipelineDefinition` is an ordered list of `StageConfig`s plus some
//! bookkeeping metadata. Definitions are read-only input to the executor; they
//! are serialized as JSON with snake_case keys. The legacy key names
//! `algorithm_id`, `components` and `config` are accepted on read.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Stage type tag as written in a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    KeywordSearch,
    VectorSearch,
    HybridSearch,
    Merge,
    Rerank,
    Filter,
    Boost,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::KeywordSearch,
        StageKind::VectorSearch,
        StageKind::HybridSearch,
        StageKind::Merge,
        StageKind::Rerank,
        StageKind::Filter,
        StageKind::Boost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeywordSearch => "keyword_search",
            Self::VectorSearch => "vector_search",
            Self::HybridSearch => "hybrid_search",
            Self::Merge => "merge",
            Self::Rerank => "rerank",
            Self::Filter => "filter",
            Self::Boost => "boost",
        }
    }

    /// Search-kind stages query the backend and take no result inputs.
    pub fn is_search(self) -> bool {
        matches!(self, Self::KeywordSearch | Self::VectorSearch | Self::HybridSearch)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownStageType(s.to_string()))
    }
}

fn enabled_by_default() -> bool {
    true
}

/// One step of a pipeline: a type tag plus that stage's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(rename = "type")]
    pub kind: StageKind,
    #[serde(default, alias = "config")]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl StageConfig {
    /// Non-object `parameters` are treated as an empty mapping.
    pub fn new(kind: StageKind, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { kind, parameters, name: None, enabled: true }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Draft,
    Testing,
    Production,
}

/// Timestamps are written as RFC 3339. On read, offset-less values such as
/// `2024-01-15 10:30:00.123456` are also accepted and taken as UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineMetadata {
    pub created_by: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    pub status: PipelineStatus,
    pub ab_test_id: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl Default for PipelineMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_by: None,
            created_at: now,
            updated_at: now,
            status: PipelineStatus::Draft,
            ab_test_id: None,
            description: None,
            tags: Vec::new(),
        }
    }
}

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Some(dt) = OFFSET_FORMATS.iter().find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok()) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(alias = "algorithm_id")]
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub name: String,
    #[serde(alias = "components")]
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub metadata: PipelineMetadata,
}

impl PipelineDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stages: Vec<StageConfig>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            name: name.into(),
            stages,
            metadata: PipelineMetadata::default(),
        }
    }

    /// Enabled stages paired with their declared (0-based) position.
    pub fn enabled_stages(&self) -> Vec<(usize, &StageConfig)> {
        self.stages.iter().enumerate().filter(|(_, s)| s.enabled).collect()
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::InvalidConfig(format!("pipeline definition: {e}")))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// How the executor schedules stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Strictly declared order, one carried-forward result.
    Sequential,
    /// Leading search stages run concurrently, the rest sequentially.
    #[default]
    #[serde(alias = "parallel")]
    Phased,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Phased => "phased",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "phased" | "parallel" => Ok(Self::Phased),
            other => Err(Error::InvalidConfig(format!("unknown execution mode '{other}'"))),
        }
    }
}
