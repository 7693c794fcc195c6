//! Events and handlers for [`Pipeline::run`](super::Pipeline::run).
//!
//! The orchestrator reports progress through [`PipelineEvent`] variants that
//! cover a whole run, from submission through each stage to completion.
//! Callers implement [`EventHandler`] to observe them for logging, terminal
//! output, UI state or WebSocket broadcast.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | Custom `impl EventHandler` | Full control (UI state, broadcast) |

use tracing::{debug, info, trace, warn};

use super::PipelineState;
use crate::PipelineError;
use crate::stage::Stage;

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the pipeline during a run.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    /// A validated context was accepted and the run is starting.
    Submitted { context: &'a str },
    /// The run moved between states.
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
    /// A stage is about to call the model.
    StageStarted { stage: Stage, model: &'a str },
    /// A text fragment arrived for a stage.
    TextDelta { stage: Stage, text: &'a str },
    /// The diagnosis stage finished and its labels are normalized.
    ProblemsIdentified(&'a [String]),
    /// The solutions stage finished and its labels are normalized.
    SolutionsSuggested(&'a [String]),
    /// The response stage finished.
    ResponseReady(&'a str),
    /// The run was abandoned. Remaining stages will not run.
    Failed { error: &'a PipelineError },
    /// The run is over and the pipeline is back to idle.
    Finished { success: bool },
}

impl PipelineEvent<'_> {
    /// The stage the event concerns, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineEvent::StageStarted { stage, .. } | PipelineEvent::TextDelta { stage, .. } => {
                Some(*stage)
            }
            PipelineEvent::ProblemsIdentified(_) => Some(Stage::Diagnosis),
            PipelineEvent::SolutionsSuggested(_) => Some(Stage::Solutions),
            PipelineEvent::ResponseReady(_) => Some(Stage::Response),
            PipelineEvent::Failed { error } => error.stage(),
            _ => None,
        }
    }
}

/// Handler for pipeline events.
///
/// Handlers are called synchronously from the running pipeline. Keep them
/// short: take a lock, update some state, release it.
///
/// # Example
///
/// ```ignore
/// struct Printer;
///
/// impl EventHandler for Printer {
///     fn on_event(&self, event: &PipelineEvent<'_>) {
///         match event {
///             PipelineEvent::ProblemsIdentified(labels) => println!("{labels:?}"),
///             PipelineEvent::ResponseReady(text) => println!("{text}"),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event during the run. The default ignores it.
    fn on_event(&self, event: &PipelineEvent<'_>) {
        let _ = event;
    }
}

/// A handler that ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let PipelineEvent::TextDelta { text, .. } = event {
///         eprint!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&PipelineEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&PipelineEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&PipelineEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(UiEventHandler::new(state.clone()));
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::Submitted { context } => {
                info!("Run submitted ({} chars of context)", context.chars().count());
            }
            PipelineEvent::StateChanged { from, to } => {
                debug!("State: {from} → {to}");
            }
            PipelineEvent::StageStarted { stage, model } => {
                info!("[{stage}] calling {model}");
            }
            PipelineEvent::TextDelta { stage, text } => {
                let preview: String = text.chars().take(80).collect();
                trace!("[{stage}] delta: {preview}");
            }
            PipelineEvent::ProblemsIdentified(labels) => {
                info!("[diagnosis] {} problem area(s): {}", labels.len(), labels.join(", "));
            }
            PipelineEvent::SolutionsSuggested(labels) => {
                info!("[solutions] {} suggestion(s): {}", labels.len(), labels.join(", "));
            }
            PipelineEvent::ResponseReady(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "[response] {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            PipelineEvent::Failed { error } => {
                warn!("Run failed: {error}");
            }
            PipelineEvent::Finished { success } => {
                info!("Run finished (success={success})");
            }
        }
    }
}
