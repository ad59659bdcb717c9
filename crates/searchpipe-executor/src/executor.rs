//! Runs a pipeline definition end to end.
//!
//! Only enabled stages take part. Every stage is built before the first one
//! runs, so configuration errors never leave a half-executed pipeline behind.
//! Any stage failure aborts the execution and is reported with the stage's
//! declared position and type; no partial result is returned.

use std::slice;
use std::time::Instant;

use futures::future::try_join_all;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use searchpipe_core::error::{Error, Result};
use searchpipe_core::pipeline::{ExecutionMode, PipelineDefinition, StageConfig};
use searchpipe_core::types::{Context, ExecutionResult, Metadata, ResultSet};
use searchpipe_stages::{Stage, StageFactory};

/// A built stage together with where it was declared.
struct Planned<'a> {
    position: usize,
    config: &'a StageConfig,
    stage: Stage,
}

/// Per-call inputs shared by every stage of one execution.
#[derive(Clone, Copy)]
struct Request<'a> {
    query: &'a str,
    query_vector: Option<&'a [f64]>,
    context: Option<&'a Context>,
}

#[derive(Clone)]
pub struct PipelineExecutor {
    factory: StageFactory,
}

impl PipelineExecutor {
    pub fn new(factory: StageFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &StageFactory {
        &self.factory
    }

    /// Execute `definition` in the given mode.
    pub async fn execute(
        &self,
        definition: &PipelineDefinition,
        query: &str,
        query_vector: Option<&[f64]>,
        context: Option<&Context>,
        mode: ExecutionMode,
    ) -> Result<ExecutionResult> {
        match mode {
            ExecutionMode::Sequential => self.execute_sequential(definition, query, query_vector, context).await,
            ExecutionMode::Phased => self.execute_phased(definition, query, query_vector, context).await,
        }
    }

    /// Run the enabled stages strictly in declared order with a single
    /// carried-forward result.
    ///
    /// A search stage replaces the carried result; merge and rerank receive
    /// it as their only input. Two search stages in a row are not fused: the
    /// later one wins. Use phased mode to combine several searches.
    #[instrument(name = "pipeline", skip_all, fields(pipeline = %definition.id, mode = "sequential"))]
    pub async fn execute_sequential(
        &self,
        definition: &PipelineDefinition,
        query: &str,
        query_vector: Option<&[f64]>,
        context: Option<&Context>,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let request = Request { query, query_vector, context };
        let plan = self.plan(definition)?;

        let mut stage_results: Vec<ResultSet> = Vec::with_capacity(plan.len());
        let mut carried: Option<usize> = None;
        let mut carried_from_search = false;
        for planned in &plan {
            let is_search = planned.stage.is_search();
            if is_search && carried_from_search {
                warn!(
                    position = planned.position,
                    "consecutive search stages in sequential mode; earlier result is dropped"
                );
            }
            let inputs: &[ResultSet] = match carried {
                Some(idx) => slice::from_ref(&stage_results[idx]),
                None => &[],
            };
            let result = run_stage(planned, request, inputs).await?;
            stage_results.push(result);
            carried = Some(stage_results.len() - 1);
            carried_from_search = is_search;
        }

        let metadata = base_metadata(definition, ExecutionMode::Sequential, plan.len());
        finish(definition, query, stage_results, start, metadata)
    }

    /// Run the leading search stages concurrently, then the remaining stages
    /// one after another.
    ///
    /// The first post-search stage receives every search result in declared
    /// order; each later stage receives only its predecessor's output. A
    /// search stage after a non-search stage is `InvalidPipelineShape`, raised
    /// before any stage runs.
    #[instrument(name = "pipeline", skip_all, fields(pipeline = %definition.id, mode = "phased"))]
    pub async fn execute_phased(
        &self,
        definition: &PipelineDefinition,
        query: &str,
        query_vector: Option<&[f64]>,
        context: Option<&Context>,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let request = Request { query, query_vector, context };
        let enabled = definition.enabled_stages();
        if enabled.is_empty() {
            return Err(Error::EmptyPipeline(definition.id.clone()));
        }
        let split = search_phase_len(&enabled)?;
        let plan = self.build(&enabled)?;
        let (searches, post) = plan.split_at(split);

        // Fan out, then join: order follows declaration, the first failure wins.
        let mut stage_results =
            try_join_all(searches.iter().map(|planned| run_stage(planned, request, &[]))).await?;
        debug!(searches = searches.len(), "search phase complete");

        let mut previous: Option<usize> = None;
        for planned in post {
            let result = match previous {
                None => run_stage(planned, request, &stage_results).await?,
                Some(idx) => run_stage(planned, request, slice::from_ref(&stage_results[idx])).await?,
            };
            stage_results.push(result);
            previous = Some(stage_results.len() - 1);
        }

        let mut metadata = base_metadata(definition, ExecutionMode::Phased, plan.len());
        metadata.insert("parallel_searches".into(), json!(searches.len()));
        finish(definition, query, stage_results, start, metadata)
    }

    fn plan<'a>(&self, definition: &'a PipelineDefinition) -> Result<Vec<Planned<'a>>> {
        let enabled = definition.enabled_stages();
        if enabled.is_empty() {
            return Err(Error::EmptyPipeline(definition.id.clone()));
        }
        self.build(&enabled)
    }

    fn build<'a>(&self, enabled: &[(usize, &'a StageConfig)]) -> Result<Vec<Planned<'a>>> {
        enabled
            .iter()
            .map(|&(position, config)| {
                let stage = self.factory.create_from_config(config).map_err(|e| e.at_stage(position, config.kind))?;
                Ok(Planned { position, config, stage })
            })
            .collect()
    }
}

/// Number of leading search-kind stages; errors if a search stage follows a
/// non-search stage.
fn search_phase_len(enabled: &[(usize, &StageConfig)]) -> Result<usize> {
    let split = enabled.iter().take_while(|(_, c)| c.kind.is_search()).count();
    if let Some((position, config)) = enabled[split..].iter().find(|(_, c)| c.kind.is_search()) {
        return Err(Error::InvalidPipelineShape(format!(
            "search stage {} ({}) follows a non-search stage; search stages must come first",
            position, config.kind
        )));
    }
    Ok(split)
}

async fn run_stage(planned: &Planned<'_>, request: Request<'_>, inputs: &[ResultSet]) -> Result<ResultSet> {
    let Planned { position, config, stage } = planned;
    let mut result = stage
        .execute(request.query, request.query_vector, request.context, inputs)
        .await
        .map_err(|e| e.at_stage(*position, config.kind))?;
    result.metadata.insert("stage_position".into(), json!(position));
    if let Some(name) = &config.name {
        result.metadata.insert("stage_name".into(), json!(name));
    }
    debug!(
        position,
        kind = %config.kind,
        hits = result.len(),
        elapsed_ms = result.elapsed_ms.unwrap_or_default(),
        "stage finished"
    );
    Ok(result)
}

fn base_metadata(definition: &PipelineDefinition, mode: ExecutionMode, stage_count: usize) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("pipeline_version".into(), json!(definition.version));
    metadata.insert("pipeline_name".into(), json!(definition.name));
    metadata.insert("mode".into(), json!(mode.as_str()));
    metadata.insert("stage_count".into(), json!(stage_count));
    metadata
}

fn finish(
    definition: &PipelineDefinition,
    query: &str,
    stage_results: Vec<ResultSet>,
    start: Instant,
    metadata: Metadata,
) -> Result<ExecutionResult> {
    let final_result = stage_results.last().cloned().ok_or_else(|| Error::EmptyPipeline(definition.id.clone()))?;
    let total_elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
        pipeline = %definition.id,
        stages = stage_results.len(),
        hits = final_result.len(),
        total_elapsed_ms,
        "pipeline executed"
    );
    Ok(ExecutionResult {
        pipeline_id: definition.id.clone(),
        query: query.to_string(),
        final_result,
        stage_results,
        total_elapsed_ms,
        metadata,
    })
}
