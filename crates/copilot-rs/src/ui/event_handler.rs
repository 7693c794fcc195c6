//! `EventHandler` → `UiState` bridge.
//!
//! [`UiEventHandler`] maps pipeline events to UI state updates. Frontends
//! compose it with their own handlers via
//! [`CompositeEventHandler`](crate::pipeline::CompositeEventHandler):
//!
//! ```ignore
//! let handler = CompositeEventHandler::new()
//!     .with(LoggingHandler)
//!     .with(UiEventHandler::new(ui_state.clone()));
//! ```

use std::sync::{Arc, Mutex};

use crate::pipeline::{EventHandler, PipelineEvent};

use super::{
    UiState, fail_run, push_stage_delta, set_pipeline_state, set_problems, set_response,
    set_solutions, start_stage,
};

/// Event handler that keeps a shared [`UiState`] current.
pub struct UiEventHandler {
    state: Arc<Mutex<UiState>>,
}

impl UiEventHandler {
    pub fn new(state: Arc<Mutex<UiState>>) -> Self {
        Self { state }
    }
}

impl EventHandler for UiEventHandler {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::StateChanged { to, .. } => set_pipeline_state(&self.state, *to),
            PipelineEvent::StageStarted { stage, .. } => start_stage(&self.state, *stage),
            PipelineEvent::TextDelta { text, .. } => push_stage_delta(&self.state, text),
            PipelineEvent::ProblemsIdentified(labels) => set_problems(&self.state, labels),
            PipelineEvent::SolutionsSuggested(labels) => set_solutions(&self.state, labels),
            PipelineEvent::ResponseReady(text) => set_response(&self.state, text),
            PipelineEvent::Failed { .. } => fail_run(&self.state),
            PipelineEvent::Submitted { .. } | PipelineEvent::Finished { .. } => {}
        }
    }
}
