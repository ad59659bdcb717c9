use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::pipeline::PipelineDefinition;
use crate::types::BackendResponse;

/// Query-execution capability of a document search backend.
///
/// Implementations must be safe for concurrent use: the executor issues
/// several queries at once through the same handle.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a backend-defined structured query against `collection`.
    async fn query(&self, collection: &str, body: &Value) -> anyhow::Result<BackendResponse>;
}

/// Source of named pipeline definitions.
pub trait PipelineStore: Send + Sync {
    /// `Ok(None)` when no definition exists under `id`.
    fn load(&self, id: &str) -> Result<Option<PipelineDefinition>>;
    fn save(&self, definition: &PipelineDefinition) -> Result<()>;
    fn list(&self) -> Result<Vec<PipelineDefinition>>;
}
