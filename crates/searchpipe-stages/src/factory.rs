use std::sync::Arc;

use serde_json::{Map, Value};

use searchpipe_core::error::{Error, Result};
use searchpipe_core::pipeline::{PipelineDefinition, StageConfig, StageKind};
use searchpipe_core::traits::SearchBackend;

use crate::config::{KeywordSearchConfig, MergeConfig, RerankConfig, VectorSearchConfig};
use crate::keyword::KeywordSearchStage;
use crate::merge::MergeStage;
use crate::rerank::RerankStage;
use crate::stage::Stage;
use crate::vector::VectorSearchStage;

/// Builds stages from definitions. Search stages are bound to the shared
/// backend handle and to `parameters["index"]`, falling back to the default
/// collection. Construction performs no I/O.
#[derive(Clone)]
pub struct StageFactory {
    backend: Arc<dyn SearchBackend>,
    default_collection: String,
}

impl StageFactory {
    pub fn new(backend: Arc<dyn SearchBackend>, default_collection: impl Into<String>) -> Self {
        Self { backend, default_collection: default_collection.into() }
    }

    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    pub fn create(&self, kind: StageKind, parameters: &Map<String, Value>) -> Result<Stage> {
        match kind {
            StageKind::KeywordSearch => Ok(Stage::KeywordSearch(KeywordSearchStage::new(
                KeywordSearchConfig::from_params(parameters)?,
                Arc::clone(&self.backend),
                self.collection_for(parameters)?,
            ))),
            StageKind::VectorSearch => Ok(Stage::VectorSearch(VectorSearchStage::new(
                VectorSearchConfig::from_params(parameters)?,
                Arc::clone(&self.backend),
                self.collection_for(parameters)?,
            ))),
            StageKind::Merge => Ok(Stage::Merge(MergeStage::new(MergeConfig::from_params(parameters)?))),
            StageKind::Rerank => Ok(Stage::Rerank(RerankStage::new(RerankConfig::from_params(parameters)?))),
            StageKind::HybridSearch | StageKind::Filter | StageKind::Boost => {
                Err(Error::UnknownStageType(kind.to_string()))
            }
        }
    }

    /// Like `create`, from a raw type tag.
    pub fn create_from_tag(&self, tag: &str, parameters: &Map<String, Value>) -> Result<Stage> {
        self.create(tag.parse()?, parameters)
    }

    pub fn create_from_config(&self, config: &StageConfig) -> Result<Stage> {
        self.create(config.kind, &config.parameters)
    }

    /// Build every enabled stage once so malformed parameters or unsupported
    /// stage types surface when a definition is loaded.
    pub fn validate_pipeline(&self, definition: &PipelineDefinition) -> Result<()> {
        let enabled = definition.enabled_stages();
        if enabled.is_empty() {
            return Err(Error::EmptyPipeline(definition.id.clone()));
        }
        for (position, config) in enabled {
            self.create_from_config(config).map_err(|e| e.at_stage(position, config.kind))?;
        }
        Ok(())
    }

    fn collection_for(&self, parameters: &Map<String, Value>) -> Result<String> {
        match parameters.get("index") {
            None | Some(Value::Null) => Ok(self.default_collection.clone()),
            Some(Value::String(name)) if !name.is_empty() => Ok(name.clone()),
            Some(other) => Err(Error::InvalidConfig(format!("index must be a non-empty string, got {other}"))),
        }
    }
}
