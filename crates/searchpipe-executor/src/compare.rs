//! Side-by-side runs of one query against several pipelines.

use serde_json::{json, Value};
use tracing::{instrument, warn};

use searchpipe_core::pipeline::{ExecutionMode, PipelineDefinition};
use searchpipe_core::types::{Context, ExecutionResult};

use crate::executor::PipelineExecutor;

#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    pub pipeline_id: String,
    /// The execution, or the rendered error when it failed.
    pub result: Result<ExecutionResult, String>,
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub query: String,
    pub outcomes: Vec<ComparisonOutcome>,
    pub successful: usize,
    pub failed: usize,
}

impl Comparison {
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.successful == 0
    }

    /// JSON view: one summary per successful pipeline, one error entry per
    /// failed one, plus counts.
    pub fn summary(&self) -> Value {
        let results: Vec<Value> = self
            .outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(result) => result.summary(),
                Err(error) => json!({ "pipeline_id": outcome.pipeline_id, "error": error }),
            })
            .collect();
        json!({
            "query": self.query,
            "results": results,
            "comparison_metadata": {
                "num_pipelines": self.outcomes.len(),
                "successful": self.successful,
                "failed": self.failed,
            },
        })
    }
}

impl PipelineExecutor {
    /// Execute `query` against each definition in turn. A failing pipeline is
    /// recorded and does not stop the others.
    #[instrument(skip_all, fields(pipelines = definitions.len(), mode = %mode))]
    pub async fn compare(
        &self,
        definitions: &[PipelineDefinition],
        query: &str,
        query_vector: Option<&[f64]>,
        context: Option<&Context>,
        mode: ExecutionMode,
    ) -> Comparison {
        let mut outcomes = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let result = self
                .execute(definition, query, query_vector, context, mode)
                .await
                .map_err(|e| {
                    warn!(pipeline = %definition.id, error = %e, "pipeline failed during comparison");
                    e.to_string()
                });
            outcomes.push(ComparisonOutcome { pipeline_id: definition.id.clone(), result });
        }
        let successful = outcomes.iter().filter(|o| o.result.is_ok()).count();
        Comparison { query: query.to_string(), failed: outcomes.len() - successful, successful, outcomes }
    }
}
