//! Convenience re-exports for common `copilot-rs` types.
//!
//! ```ignore
//! use copilot_rs::prelude::*;
//! ```
//!
//! Covers the client, the pipeline with its events and handlers, stage
//! configuration and the UI state. Wire-level chunk types and the SSE
//! decoder stay in their modules.

// ── Client ──────────────────────────────────────────────────────────
pub use crate::api::{LiveUpdate, ModelAdapter, ModelBackend, RetryConfig};
pub use crate::{Credential, Endpoint, GeminiClient};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::pipeline::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    PatientContext, Pipeline, PipelineEvent, PipelineOptions, PipelineState, PipelineSummary,
};
pub use crate::stage::{Stage, StageConfig, StageConfigs};

// ── UI state ────────────────────────────────────────────────────────
pub use crate::ui::event_handler::UiEventHandler;
pub use crate::ui::{Features, SummaryExport, UiState};
