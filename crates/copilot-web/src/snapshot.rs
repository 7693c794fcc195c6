//! Serializable projection of [`UiState`] for WebSocket and REST transport.
//!
//! Adds the derived fields a browser needs without recomputing them: the
//! loading flag and the response rendered as HTML paragraphs.

use copilot_rs::pipeline::PipelineState;
use copilot_rs::stage::Stage;
use copilot_rs::ui::{Features, UiState};
use serde::Serialize;

/// Serializable view of [`UiState`] sent over WebSocket or REST.
#[derive(Debug, Serialize)]
pub struct UiStateSnapshot {
    // ── Pipeline progress ──
    pub state: PipelineState,
    pub loading: bool,
    pub active_stage: Option<Stage>,
    pub streaming_buffer: String,

    // ── Summary panel ──
    pub patient_context: String,
    pub problems: Vec<String>,
    pub solutions: Vec<String>,

    // ── Chat panel ──
    pub response: Option<String>,
    pub response_html: String,

    pub features: Features,
}

impl UiStateSnapshot {
    /// Build a snapshot from the current `UiState`. Call while holding the
    /// lock.
    pub fn from_ui_state(state: &UiState) -> Self {
        Self {
            state: state.pipeline_state,
            loading: state.is_loading(),
            active_stage: state.active_stage,
            streaming_buffer: state.streaming_buffer.clone(),
            patient_context: state.patient_context.clone(),
            problems: state.problems.clone(),
            solutions: state.solutions.clone(),
            response: state.response.clone(),
            response_html: state.response_html(),
            features: state.features,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
