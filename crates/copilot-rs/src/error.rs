//! Error types shared by the client, the adapter and the pipeline.
//!
//! Validation failures are caught before any remote call. Model failures
//! carry the upstream detail for logs; callers at the HTTP boundary map
//! them to a generic message.

use thiserror::Error;

use crate::stage::Stage;

/// A required input was missing or had the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Patient context is required")]
    MissingContext,
    #[error("Valid diagnosis array is required")]
    InvalidDiagnosis,
    #[error("Valid solutions array is required")]
    InvalidSolutions,
}

/// Failure talking to the generative-model service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("model API HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// The body was not the JSON shape we expected.
    #[error("malformed model response: {0}")]
    Malformed(String),
    /// A single-shot reply carried no candidates at all.
    #[error("model returned no candidates")]
    NoCandidates,
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ModelError {
    /// Whether the error is worth retrying (rate limits, 5xx, network).
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ModelError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ModelError::Malformed(_) | ModelError::NoCandidates | ModelError::Client(_) => false,
        }
    }
}

/// Errors surfaced by [`Pipeline`](crate::pipeline::Pipeline) operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: ModelError,
    },
    #[error("a pipeline run is already in progress")]
    Busy,
}

impl PipelineError {
    /// The stage that failed, if the failure came from a model call.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
