//! The three pipeline stages and their fixed generation settings.
//!
//! [`StageConfigs`] is built once at process start and shared immutably.
//! Only the model identifiers come from process configuration; token
//! limits, sampling and system instructions are constants.

pub mod prompt;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Content, GenerateContentRequest, GenerationConfig};

/// Maximum output tokens for the list-producing stages.
pub const LIST_STAGE_MAX_TOKENS: u32 = 8192;

/// Sampling temperature for the list-producing stages.
pub const LIST_STAGE_TEMPERATURE: f32 = 1.0;

/// Nucleus sampling threshold for the list-producing stages.
pub const LIST_STAGE_TOP_P: f32 = 0.95;

const DIAGNOSIS_INSTRUCTION: &str = "You are a mental health analysis assistant. Your task is to \
help mental health counselors identify potential problem areas their patients might be \
experiencing based on the provided patient context. You are not a substitute for a licensed \
professional and your output should be used for informational purposes only.";

const SOLUTIONS_INSTRUCTION: &str = "You are a \"Mental Health Copilot\" designed to assist \
mental health counselors. Your task is to analyze patient information and their current context \
to suggest possible solutions or interventions.";

const RESPONSE_INSTRUCTION: &str = "You are a mental health support tool designed to assist \
counselors in providing the best possible care to their patients. Your role is to analyze \
patient information and generate natural language responses that can aid the counselor in \
their treatment approach.";

/// One of the three sequential model calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Diagnosis,
    Solutions,
    Response,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Diagnosis, Stage::Solutions, Stage::Response];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Diagnosis => "diagnosis",
            Stage::Solutions => "solutions",
            Stage::Response => "response",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation parameters bound to one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub stage: Stage,
    /// Model identifier: a bare name (`gemini-2.0-flash-001`) or a full
    /// resource path (`projects/…/endpoints/…`).
    pub model: String,
    pub system_instruction: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Consume the reply as an SSE stream instead of a single payload.
    pub streaming: bool,
}

impl StageConfig {
    /// Streamed problem-area extraction.
    pub fn diagnosis(model: impl Into<String>) -> Self {
        Self::list_stage(Stage::Diagnosis, model.into(), DIAGNOSIS_INSTRUCTION)
    }

    /// Streamed intervention suggestions.
    pub fn solutions(model: impl Into<String>) -> Self {
        Self::list_stage(Stage::Solutions, model.into(), SOLUTIONS_INSTRUCTION)
    }

    /// Single-shot counselor response. Uses the service's default sampling.
    pub fn response(model: impl Into<String>) -> Self {
        Self {
            stage: Stage::Response,
            model: model.into(),
            system_instruction: RESPONSE_INSTRUCTION.to_string(),
            max_output_tokens: None,
            temperature: None,
            top_p: None,
            streaming: false,
        }
    }

    fn list_stage(stage: Stage, model: String, instruction: &str) -> Self {
        Self {
            stage,
            model,
            system_instruction: instruction.to_string(),
            max_output_tokens: Some(LIST_STAGE_MAX_TOKENS),
            temperature: Some(LIST_STAGE_TEMPERATURE),
            top_p: Some(LIST_STAGE_TOP_P),
            streaming: true,
        }
    }

    /// Build the request body for a rendered prompt.
    pub fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        let has_sampling = self.max_output_tokens.is_some()
            || self.temperature.is_some()
            || self.top_p.is_some();

        let generation_config = has_sampling.then(|| GenerationConfig {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            response_modalities: Some(vec!["TEXT".to_string()]),
        });

        GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: Some(Content::system(&self.system_instruction)),
            generation_config,
        }
    }
}

/// The per-process set of stage configurations.
#[derive(Debug, Clone)]
pub struct StageConfigs {
    pub diagnosis: StageConfig,
    pub solutions: StageConfig,
    pub response: StageConfig,
}

impl StageConfigs {
    pub fn new(
        diagnosis_model: impl Into<String>,
        solutions_model: impl Into<String>,
        response_model: impl Into<String>,
    ) -> Self {
        Self {
            diagnosis: StageConfig::diagnosis(diagnosis_model),
            solutions: StageConfig::solutions(solutions_model),
            response: StageConfig::response(response_model),
        }
    }

    /// Use one model for every stage.
    pub fn single_model(model: &str) -> Self {
        Self::new(model, model, model)
    }

    pub fn for_stage(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::Diagnosis => &self.diagnosis,
            Stage::Solutions => &self.solutions,
            Stage::Response => &self.response,
        }
    }
}

impl Default for StageConfigs {
    fn default() -> Self {
        Self::single_model(crate::DEFAULT_MODEL)
    }
}
