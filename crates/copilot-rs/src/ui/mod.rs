//! Presentation state for the two-pane counselor UI.
//!
//! This module holds the data any frontend (web, terminal, headless) shows
//! for a session: the summary panel (patient context, problems, solutions)
//! and the chat panel (the counselor response). It has no rendering
//! dependencies.
//!
//! # Architecture
//!
//! ```text
//! Pipeline::run ──events──▶ UiEventHandler ──writes──▶ Arc<Mutex<UiState>> ◀──reads── frontend
//! ```
//!
//! [`begin_run`] is the in-flight guard: it reserves the session for one run
//! and rejects a second submission until the state is back to `Idle`.

pub mod event_handler;
pub mod export;
pub mod format;

pub use export::SummaryExport;
pub use format::{format_paragraphs, format_response_html};

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::pipeline::{PatientContext, PipelineState};
use crate::stage::Stage;
use crate::{FAILURE_MESSAGE, PipelineError};

/// Optional session actions, toggled per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// "Clear Patient Data" resets the session.
    pub clear: bool,
    /// "Save summary" downloads a [`SummaryExport`].
    pub export: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            clear: true,
            export: true,
        }
    }
}

// ── UiState ───────────────────────────────────────────────────────────

/// Session state shared between a running pipeline and a frontend.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub pipeline_state: PipelineState,
    /// The context of the last submitted run.
    pub patient_context: String,
    pub problems: Vec<String>,
    pub solutions: Vec<String>,
    /// The chat panel text. `None` until a run finishes.
    pub response: Option<String>,
    /// Live text of the stage currently streaming. Cleared when the stage's
    /// result arrives.
    pub streaming_buffer: String,
    pub active_stage: Option<Stage>,
    pub features: Features,
}

impl UiState {
    pub fn with_features(features: Features) -> Self {
        Self {
            features,
            ..Default::default()
        }
    }

    /// A run is in flight.
    pub fn is_loading(&self) -> bool {
        self.pipeline_state.is_busy()
    }

    /// The response as HTML paragraphs, or an empty string.
    pub fn response_html(&self) -> String {
        self.response
            .as_deref()
            .map(format_response_html)
            .unwrap_or_default()
    }

    /// Snapshot the summary panel for download, stamped now.
    pub fn export(&self) -> SummaryExport {
        SummaryExport {
            patient_context: self.patient_context.clone(),
            problems_identified: self.problems.clone(),
            possible_solutions: self.solutions.clone(),
            response: self.response.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        }
    }
}

// ── Convenience Updaters ──────────────────────────────────────────────

/// Lock the shared state mutex and run a block on the guard. A poisoned
/// lock is recovered, so updates keep landing after a panicking writer.
macro_rules! with_state {
    ($state:expr, |$s:ident| $body:block) => {{
        let mut $s = lock($state);
        $body
    }};
}

fn lock(state: &Arc<Mutex<UiState>>) -> MutexGuard<'_, UiState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reserve the session for a new run.
///
/// Rejects with [`PipelineError::Busy`] while a run is in flight. On
/// success the previous run's lists and response are cleared and the
/// state moves to `AwaitingDiagnosis`.
pub fn begin_run(state: &Arc<Mutex<UiState>>, context: &PatientContext) -> Result<(), PipelineError> {
    let mut s = lock(state);
    if s.is_loading() {
        return Err(PipelineError::Busy);
    }
    s.pipeline_state = PipelineState::AwaitingDiagnosis;
    s.patient_context = context.as_str().to_string();
    s.problems.clear();
    s.solutions.clear();
    s.response = None;
    s.streaming_buffer.clear();
    s.active_stage = None;
    Ok(())
}

/// Reset the session to its initial, empty state. Feature flags survive.
pub fn clear(state: &Arc<Mutex<UiState>>) -> Result<(), PipelineError> {
    let mut s = lock(state);
    if s.is_loading() {
        return Err(PipelineError::Busy);
    }
    let features = s.features;
    *s = UiState::with_features(features);
    Ok(())
}

/// Force the session back to `Idle` after an aborted run. Lists already
/// shown are kept.
pub fn cancel_reset(state: &Arc<Mutex<UiState>>) {
    with_state!(state, |s| {
        s.pipeline_state = PipelineState::Idle;
        s.streaming_buffer.clear();
        s.active_stage = None;
    });
}

pub fn set_pipeline_state(state: &Arc<Mutex<UiState>>, to: PipelineState) {
    with_state!(state, |s| { s.pipeline_state = to });
}

/// Mark `stage` as the one currently talking to the model.
pub fn start_stage(state: &Arc<Mutex<UiState>>, stage: Stage) {
    with_state!(state, |s| {
        s.active_stage = Some(stage);
        s.streaming_buffer.clear();
    });
}

/// Append a streamed fragment to the live buffer.
pub fn push_stage_delta(state: &Arc<Mutex<UiState>>, delta: &str) {
    with_state!(state, |s| { s.streaming_buffer.push_str(delta) });
}

pub fn set_problems(state: &Arc<Mutex<UiState>>, problems: &[String]) {
    with_state!(state, |s| {
        s.problems = problems.to_vec();
        s.streaming_buffer.clear();
    });
}

pub fn set_solutions(state: &Arc<Mutex<UiState>>, solutions: &[String]) {
    with_state!(state, |s| {
        s.solutions = solutions.to_vec();
        s.streaming_buffer.clear();
    });
}

pub fn set_response(state: &Arc<Mutex<UiState>>, response: &str) {
    with_state!(state, |s| {
        s.response = Some(response.to_string());
        s.streaming_buffer.clear();
        s.active_stage = None;
    });
}

/// Show the generic apology in the chat panel.
pub fn fail_run(state: &Arc<Mutex<UiState>>) {
    set_response(state, FAILURE_MESSAGE);
}

// ── Tests ─────────────────────────────────────────────────────────────
