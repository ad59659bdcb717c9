use tracing::instrument;

use searchpipe_core::error::Result;
use searchpipe_core::pipeline::StageKind;
use searchpipe_core::types::{Context, ResultSet};

use crate::keyword::KeywordSearchStage;
use crate::merge::MergeStage;
use crate::rerank::RerankStage;
use crate::vector::VectorSearchStage;

/// A constructed pipeline stage.
///
/// Search stages issue exactly one backend query per call and ignore
/// `inputs`. Merge and rerank are pure functions of `inputs` and fail with
/// `InvalidInput` when it is empty. No stage modifies `query` or `context`.
pub enum Stage {
    KeywordSearch(KeywordSearchStage),
    VectorSearch(VectorSearchStage),
    Merge(MergeStage),
    Rerank(RerankStage),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::KeywordSearch(_) => StageKind::KeywordSearch,
            Self::VectorSearch(_) => StageKind::VectorSearch,
            Self::Merge(_) => StageKind::Merge,
            Self::Rerank(_) => StageKind::Rerank,
        }
    }

    pub fn is_search(&self) -> bool {
        self.kind().is_search()
    }

    #[instrument(name = "stage", skip_all, fields(kind = %self.kind(), inputs = inputs.len()))]
    pub async fn execute(
        &self,
        query: &str,
        query_vector: Option<&[f64]>,
        context: Option<&Context>,
        inputs: &[ResultSet],
    ) -> Result<ResultSet> {
        match self {
            Self::KeywordSearch(stage) => stage.execute(query, context).await,
            Self::VectorSearch(stage) => stage.execute(query, query_vector, context).await,
            Self::Merge(stage) => stage.execute(inputs),
            Self::Rerank(stage) => stage.execute(inputs),
        }
    }
}
