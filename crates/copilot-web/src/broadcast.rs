//! [`EventHandler`] that converts pipeline events into WebSocket messages.
//!
//! [`WebBroadcastHandler`] turns [`PipelineEvent`] variants into [`WsMessage`]
//! values and broadcasts them to all connected WebSocket clients through a
//! `tokio::sync::broadcast` channel.

use copilot_rs::FAILURE_MESSAGE;
use copilot_rs::pipeline::{EventHandler, PipelineEvent, PipelineState};
use copilot_rs::stage::Stage;
use copilot_rs::ui::format_response_html;
use serde::Serialize;
use tokio::sync::broadcast;

/// A message sent from the server to WebSocket clients.
///
/// Discriminated on the `type` field when serialized to JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full state snapshot (sent on connect and after a client lags).
    Snapshot { data: serde_json::Value },
    /// A run started for this context. Clients clear the previous results.
    Submitted { context: String },
    /// The pipeline moved to a new state.
    State { state: PipelineState, loading: bool },
    /// A stage is calling the model.
    StageStarted { stage: Stage, model: String },
    /// Streaming text fragment for a stage.
    TextDelta { stage: Stage, delta: String },
    /// Normalized problem areas.
    Problems { labels: Vec<String> },
    /// Normalized interventions.
    Solutions { labels: Vec<String> },
    /// The counselor response, raw and as HTML paragraphs.
    Response { text: String, html: String },
    /// The run failed. Carries only the generic apology.
    Failed { message: String },
    /// The run is over.
    Finished { success: bool },
    /// The in-flight run was cancelled.
    Cancelled,
    /// The session was reset.
    Cleared,
    /// A command from this client was rejected.
    Error { message: String },
}

/// Event handler that broadcasts pipeline events to WebSocket clients.
///
/// Compose alongside [`UiEventHandler`](copilot_rs::ui::event_handler::UiEventHandler)
/// in a [`CompositeEventHandler`](copilot_rs::pipeline::CompositeEventHandler):
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(UiEventHandler::new(ui_state.clone()))
///     .with(WebBroadcastHandler::new(ws_sender));
/// ```
pub struct WebBroadcastHandler {
    sender: broadcast::Sender<WsMessage>,
}

impl WebBroadcastHandler {
    pub fn new(sender: broadcast::Sender<WsMessage>) -> Self {
        Self { sender }
    }

    /// Silently ignores send errors (no subscribers is fine).
    fn broadcast(&self, msg: WsMessage) {
        let _ = self.sender.send(msg);
    }
}

impl EventHandler for WebBroadcastHandler {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        let msg = match event {
            PipelineEvent::Submitted { context } => WsMessage::Submitted {
                context: context.to_string(),
            },
            PipelineEvent::StateChanged { to, .. } => WsMessage::State {
                state: *to,
                loading: to.is_busy(),
            },
            PipelineEvent::StageStarted { stage, model } => WsMessage::StageStarted {
                stage: *stage,
                model: model.to_string(),
            },
            PipelineEvent::TextDelta { stage, text } => WsMessage::TextDelta {
                stage: *stage,
                delta: text.to_string(),
            },
            PipelineEvent::ProblemsIdentified(labels) => WsMessage::Problems {
                labels: labels.to_vec(),
            },
            PipelineEvent::SolutionsSuggested(labels) => WsMessage::Solutions {
                labels: labels.to_vec(),
            },
            PipelineEvent::ResponseReady(text) => WsMessage::Response {
                text: text.to_string(),
                html: format_response_html(text),
            },
            PipelineEvent::Failed { .. } => WsMessage::Failed {
                message: FAILURE_MESSAGE.to_string(),
            },
            PipelineEvent::Finished { success } => WsMessage::Finished { success: *success },
        };
        self.broadcast(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_rs::{ModelError, PipelineError};

    #[test]
    fn ws_message_serializes_with_type_tag() {
        let msg = WsMessage::TextDelta {
            stage: Stage::Diagnosis,
            delta: "anx".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["stage"], "diagnosis");
        assert_eq!(json["delta"], "anx");
    }

    #[test]
    fn ws_message_state_serializes() {
        let msg = WsMessage::State {
            state: PipelineState::AwaitingSolutions,
            loading: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["state"], "awaiting_solutions");
        assert_eq!(json["loading"], true);
    }

    #[test]
    fn unit_variants_serialize_with_type_only() {
        let json = serde_json::to_value(WsMessage::Cancelled).unwrap();
        assert_eq!(json, serde_json::json!({"type": "cancelled"}));
    }

    #[test]
    fn failure_never_leaks_upstream_detail() {
        let (sender, mut rx) = broadcast::channel(16);
        let handler = WebBroadcastHandler::new(sender);
        let error = PipelineError::Stage {
            stage: Stage::Response,
            source: ModelError::Http {
                status: 403,
                body: "permission denied on project secret-project".into(),
            },
        };

        handler.on_event(&PipelineEvent::Failed { error: &error });

        match rx.try_recv().unwrap() {
            WsMessage::Failed { message } => assert_eq!(message, FAILURE_MESSAGE),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn response_carries_html() {
        let (sender, mut rx) = broadcast::channel(16);
        let handler = WebBroadcastHandler::new(sender);

        handler.on_event(&PipelineEvent::ResponseReady("Try **CBT**."));

        match rx.try_recv().unwrap() {
            WsMessage::Response { text, html } => {
                assert_eq!(text, "Try **CBT**.");
                assert_eq!(html, "<p>Try <strong>CBT</strong>.</p>");
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }
}
