use thiserror::Error;

use crate::pipeline::StageKind;

#[derive(Debug, Error)]
pub enum Error {
    /// Required data for a stage is missing (no vector, no inputs).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown stage type: {0}")]
    UnknownStageType(String),

    #[error("Unknown merge strategy: {0}")]
    UnknownMergeStrategy(String),

    #[error("Invalid pipeline shape: {0}")]
    InvalidPipelineShape(String),

    #[error("Pipeline '{0}' has no enabled stages")]
    EmptyPipeline(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Anything returned by the query-execution collaborator, kept as-is.
    /// Displayed with its whole context chain; there is no `source()` link.
    #[error("Backend failure: {0:#}")]
    Backend(anyhow::Error),

    #[error("Stage {position} ({kind}) failed: {cause}")]
    Stage {
        position: usize,
        kind: StageKind,
        cause: Box<Error>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Attach the declared stage position and stage type to an error.
    #[must_use]
    pub fn at_stage(self, position: usize, kind: StageKind) -> Self {
        Self::Stage { position, kind, cause: Box::new(self) }
    }

    /// The innermost error, looking through any `Stage` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Stage { cause, .. } => cause.root(),
            other => other,
        }
    }

    /// Position and kind of the stage that failed, if known.
    pub fn stage(&self) -> Option<(usize, StageKind)> {
        match self {
            Self::Stage { position, kind, .. } => Some((*position, *kind)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
