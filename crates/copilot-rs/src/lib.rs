//! Three-stage Gemini pipeline that turns free-text patient context into a
//! counselor-facing summary.
//!
//! `copilot-rs` sends the patient context to a hosted Gemini model three
//! times: once to extract problem areas, once to suggest interventions, and
//! once to compose a natural-language response from the two lists. The
//! lists come back as comma-separated text and are normalized into
//! proper-cased labels before they feed the final call.
//!
//! # Getting started
//!
//! ```ignore
//! use copilot_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let token = std::env::var("GOOGLE_ACCESS_TOKEN")?;
//!     let client = GeminiClient::new(
//!         Endpoint::vertex("my-project", "us-central1"),
//!         Credential::AccessToken(token),
//!     )?;
//!
//!     let pipeline = Pipeline::new(
//!         Arc::new(client),
//!         StageConfigs::single_model("gemini-2.0-flash-001"),
//!     );
//!
//!     let summary = pipeline
//!         .run("25-year-old with work stress and insomnia", &LoggingHandler)
//!         .await?;
//!
//!     println!("Problems: {:?}", summary.problems);
//!     println!("Solutions: {:?}", summary.solutions);
//!     println!("{}", summary.response);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Run the pipeline:** [`Pipeline`](pipeline::Pipeline) sequences the
//!   stages and reports progress as [`PipelineEvent`](pipeline::PipelineEvent)s
//!   to an [`EventHandler`](pipeline::EventHandler).
//! - **Call one stage:** [`Pipeline::diagnose`](pipeline::Pipeline::diagnose),
//!   [`suggest_solutions`](pipeline::Pipeline::suggest_solutions) and
//!   [`compose_response`](pipeline::Pipeline::compose_response) return the
//!   raw model text.
//! - **Talk to the model:** [`GeminiClient`] implements
//!   [`ModelBackend`](api::ModelBackend); [`ModelAdapter`](api::ModelAdapter)
//!   hides streamed vs. single-shot replies behind one call.
//! - **Drive a UI:** [`ui::UiState`] holds the summary and chat panels;
//!   [`UiEventHandler`](ui::event_handler::UiEventHandler) keeps it current.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Backend trait, SSE streaming, invocation adapter, retry |
//! | [`stage`] | Stage configs and prompt templates |
//! | [`normalize`] | Comma splitting and proper-case normalization |
//! | [`pipeline`] | Orchestrator, state machine, events |
//! | [`ui`] | Presentation state, response formatting, summary export |
//! | [`cli`] | Shared `clap` arguments for binaries |

pub mod api;
pub mod cli;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod prelude;
pub mod stage;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ModelError, PipelineError, ValidationError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

/// Base URL of the public Gemini API (API-key auth).
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for every stage when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Default Vertex AI region.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Returned by single-shot calls whose candidate carries no text.
pub const NO_RESPONSE_FALLBACK: &str = "No response generated";

/// The only failure text ever shown to the user.
pub const FAILURE_MESSAGE: &str =
    "I'm sorry, there was an error processing your request. Please try again.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Request types ──────────────────────────────────────────────────

/// One piece of a message. Only text parts are used.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A message in the `contents` array, or the system instruction.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    /// System instructions carry no role.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    /// Concatenated text of all text parts, or `None` if there is none.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Sampling parameters. Unset fields fall back to the service defaults.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

/// Body of `generateContent` / `streamGenerateContent`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

// ── Response types ─────────────────────────────────────────────────

/// A full reply, or one chunk of a streamed reply.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, or `None` for a non-text chunk.
    pub fn text(&self) -> Option<String> {
        self.candidates.first()?.content.as_ref()?.text()
    }

    /// Convenience constructor for a one-candidate text reply.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
                finish_reason: None,
            }],
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Where requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Vertex AI in a Cloud project and region.
    Vertex { project: String, location: String },
    /// The public Gemini API.
    GeminiApi,
}

impl Endpoint {
    pub fn vertex(project: impl Into<String>, location: impl Into<String>) -> Self {
        Endpoint::Vertex {
            project: project.into(),
            location: location.into(),
        }
    }

    /// URL for `{model}:{method}`. `method` may carry a query string.
    ///
    /// Vertex model identifiers that already are resource paths
    /// (`projects/…/endpoints/…` for tuned models) are used as-is.
    pub fn method_url(&self, model: &str, method: &str) -> String {
        match self {
            Endpoint::Vertex { project, location } => {
                let host = if location == "global" {
                    "aiplatform.googleapis.com".to_string()
                } else {
                    format!("{location}-aiplatform.googleapis.com")
                };
                let resource = if model.starts_with("projects/") {
                    model.to_string()
                } else {
                    format!("projects/{project}/locations/{location}/publishers/google/models/{model}")
                };
                format!("https://{host}/v1/{resource}:{method}")
            }
            Endpoint::GeminiApi => {
                let name = model.strip_prefix("models/").unwrap_or(model);
                format!("{GEMINI_API_URL}/models/{name}:{method}")
            }
        }
    }
}

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth access token, sent as a bearer token (Vertex AI).
    AccessToken(String),
    /// API key, sent as `x-goog-api-key` (Gemini API).
    ApiKey(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

/// Async HTTP client for the Gemini `generateContent` family of methods.
pub struct GeminiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: Endpoint,
    pub(crate) credential: Credential,
}

impl GeminiClient {
    pub fn new(endpoint: Endpoint, credential: Credential) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("copilot-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            credential,
        })
    }

    /// A POST request builder with auth headers attached.
    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.credential {
            Credential::AccessToken(token) => builder.bearer_auth(token),
            Credential::ApiKey(key) => builder.header("x-goog-api-key", key),
        }
    }

    /// Send a single-shot `generateContent` request.
    pub async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ModelError> {
        let url = self.endpoint.method_url(model, "generateContent");
        debug!(
            "Model request: model={}, contents={}, streaming=false",
            model,
            body.contents.len()
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self.post(&url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        debug!(
            "Model response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ModelError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Malformed(e.to_string()))?;

        if let Some(ref usage) = parsed.usage_metadata {
            debug!(
                "Token usage: prompt={}, candidates={}, total={}",
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0),
                usage.total_token_count.unwrap_or(0),
            );
        }

        Ok(parsed)
    }
}
