//! Command-line plumbing shared by the `copilot` and `copilot-web` binaries.
//!
//! [`ModelArgs`] is a `clap` argument group that every binary flattens into
//! its own parser. Each flag falls back to an environment variable, and
//! binaries load `.env` before parsing.

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::RetryConfig;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::stage::StageConfigs;
use crate::{Credential, DEFAULT_LOCATION, DEFAULT_MODEL, Endpoint, GeminiClient, ModelError};

/// Why a pipeline could not be assembled from the command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("no credentials: set GOOGLE_ACCESS_TOKEN (Vertex AI) or GEMINI_API_KEY (Gemini API)")]
    MissingCredentials,
    #[error("Vertex AI needs a project: pass --project or set GOOGLE_CLOUD_PROJECT")]
    MissingProject,
    #[error(transparent)]
    Client(#[from] ModelError),
}

/// Model service, credentials and per-stage model selection.
#[derive(clap::Args, Debug, Clone)]
pub struct ModelArgs {
    /// Google Cloud project for Vertex AI.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,

    /// Vertex AI region (`global` for the global endpoint).
    #[arg(long, env = "GOOGLE_CLOUD_LOCATION", default_value = DEFAULT_LOCATION)]
    pub location: String,

    /// OAuth access token for Vertex AI (e.g. `gcloud auth print-access-token`).
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Gemini API key. Used when no access token is given.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model for the diagnosis stage. A full `projects/…` path selects a tuned endpoint.
    #[arg(long, env = "DIAGNOSIS_MODEL", default_value = DEFAULT_MODEL)]
    pub diagnosis_model: String,

    /// Model for the solutions stage.
    #[arg(long, env = "SOLUTIONS_MODEL", default_value = DEFAULT_MODEL)]
    pub solutions_model: String,

    /// Model for the response stage.
    #[arg(long, env = "RESPONSE_MODEL", default_value = DEFAULT_MODEL)]
    pub response_model: String,

    /// Retries for transient model errors (0 disables retry).
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Run diagnosis and solutions concurrently.
    #[arg(long)]
    pub parallel: bool,
}

impl ModelArgs {
    /// Pick the endpoint and credential. An access token selects Vertex AI
    /// and wins over an API key.
    pub fn endpoint(&self) -> Result<(Endpoint, Credential), CliError> {
        if let Some(token) = &self.access_token {
            let project = self.project.as_ref().ok_or(CliError::MissingProject)?;
            return Ok((
                Endpoint::vertex(project, &self.location),
                Credential::AccessToken(token.clone()),
            ));
        }
        match &self.api_key {
            Some(key) => Ok((Endpoint::GeminiApi, Credential::ApiKey(key.clone()))),
            None => Err(CliError::MissingCredentials),
        }
    }

    pub fn stage_configs(&self) -> StageConfigs {
        StageConfigs::new(
            &self.diagnosis_model,
            &self.solutions_model,
            &self.response_model,
        )
    }

    pub fn build_client(&self) -> Result<GeminiClient, CliError> {
        let (endpoint, credential) = self.endpoint()?;
        Ok(GeminiClient::new(endpoint, credential)?)
    }

    /// A ready-to-run pipeline backed by the real model service.
    pub fn build_pipeline(&self) -> Result<Pipeline, CliError> {
        let client = self.build_client()?;
        Ok(Pipeline::new(Arc::new(client), self.stage_configs())
            .with_retry(RetryConfig::with_retries(self.retries))
            .with_options(PipelineOptions {
                parallel_first_stages: self.parallel,
            }))
    }
}

/// Install the stderr `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
