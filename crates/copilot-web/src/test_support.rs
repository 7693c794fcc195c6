//! In-memory model and session builders for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use copilot_rs::api::{BackendFuture, ChunkStream, ModelBackend};
use copilot_rs::pipeline::Pipeline;
use copilot_rs::stage::StageConfigs;
use copilot_rs::ui::{Features, UiState};
use copilot_rs::{GenerateContentRequest, GenerateContentResponse};
use futures::StreamExt;

use crate::session::Session;

const DIAGNOSIS: &str = "diag";
const SOLUTIONS: &str = "sol";
const RESPONSE: &str = "resp";

/// Fixed replies per stage, optionally delayed.
pub(crate) struct StubModel {
    /// Awaited before replying; the run yields while it elapses.
    delay: Duration,
    /// Spent synchronously while producing each streamed chunk.
    busy_work: Duration,
}

impl StubModel {
    pub(crate) fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            busy_work: Duration::ZERO,
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::new() }
    }

    pub(crate) fn blocking(busy_work: Duration) -> Self {
        Self {
            busy_work,
            ..Self::new()
        }
    }

    fn text(model: &str) -> &'static str {
        match model {
            DIAGNOSIS => "anxiety, insomnia",
            SOLUTIONS => "cbt, sleep hygiene",
            _ => "First paragraph.\n\nSecond paragraph.",
        }
    }
}

impl ModelBackend for StubModel {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        _request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, GenerateContentResponse> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(GenerateContentResponse::from_text(Self::text(model)))
        })
    }

    fn generate_stream<'a>(
        &'a self,
        model: &'a str,
        _request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, ChunkStream> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            let busy_work = self.busy_work;
            let chunk = GenerateContentResponse::from_text(Self::text(model));
            let stream: ChunkStream = Box::pin(futures::stream::iter(vec![Ok(chunk)]).map(
                move |item| {
                    std::thread::sleep(busy_work);
                    item
                },
            ));
            Ok(stream)
        })
    }
}

/// A session over `model` whose state starts with `features`.
pub(crate) fn session_with(model: StubModel, features: Features) -> Session {
    let pipeline = Pipeline::new(
        Arc::new(model),
        StageConfigs::new(DIAGNOSIS, SOLUTIONS, RESPONSE),
    );
    let ui_state = Arc::new(Mutex::new(UiState::with_features(features)));
    let (broadcast_tx, _) = tokio::sync::broadcast::channel(64);
    Session::new(Arc::new(pipeline), ui_state, broadcast_tx)
}
