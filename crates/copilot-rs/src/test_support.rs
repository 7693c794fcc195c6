//! Scripted in-memory backend for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::backend::{BackendFuture, ModelBackend};
use crate::api::streaming::ChunkStream;
use crate::{GenerateContentRequest, GenerateContentResponse, ModelError};

/// What the backend does for one call.
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Stream one text chunk per fragment (or one joined reply single-shot).
    Fragments(Vec<&'static str>),
    /// Stream these exact chunks.
    Chunks(Vec<GenerateContentResponse>),
    /// Reply single-shot with this response.
    Single(GenerateContentResponse),
    /// Fail with this HTTP status before any chunk.
    Status(u16),
    /// Stream these fragments, then break the stream.
    BreakAfter(Vec<&'static str>),
    /// Stream these fragments, then fail with this HTTP status.
    FailAfter(Vec<&'static str>, u16),
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<HashMap<String, usize>>,
    stream_calls: Mutex<HashMap<String, usize>>,
    requests: Mutex<HashMap<String, GenerateContentRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a script for `model`. The last queued script repeats.
    pub(crate) fn script(self, model: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Total calls (either mode) made for `model`.
    pub(crate) fn calls(&self, model: &str) -> usize {
        self.calls.lock().unwrap().get(model).copied().unwrap_or(0)
    }

    pub(crate) fn stream_calls(&self, model: &str) -> usize {
        self.stream_calls
            .lock()
            .unwrap()
            .get(model)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn last_request(&self, model: &str) -> Option<GenerateContentRequest> {
        self.requests.lock().unwrap().get(model).cloned()
    }

    /// The prompt text of the last request for `model`.
    pub(crate) fn last_prompt(&self, model: &str) -> Option<String> {
        self.last_request(model)?.contents.first()?.text()
    }

    fn next(&self, model: &str, request: &GenerateContentRequest, streaming: bool) -> Script {
        *self.calls.lock().unwrap().entry(model.to_string()).or_default() += 1;
        if streaming {
            *self
                .stream_calls
                .lock()
                .unwrap()
                .entry(model.to_string())
                .or_default() += 1;
        }
        self.requests
            .lock()
            .unwrap()
            .insert(model.to_string(), request.clone());

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(model) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Script::Status(404),
        }
    }
}

fn http(status: u16) -> ModelError {
    ModelError::Http {
        status,
        body: "scripted failure".to_string(),
    }
}

impl ModelBackend for ScriptedBackend {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, GenerateContentResponse> {
        let script = self.next(model, request, false);
        Box::pin(async move {
            match script {
                Script::Single(resp) => Ok(resp),
                Script::Fragments(parts) => Ok(GenerateContentResponse::from_text(parts.concat())),
                Script::Chunks(chunks) => Ok(chunks.into_iter().next().unwrap_or_default()),
                Script::Status(status) => Err(http(status)),
                Script::BreakAfter(_) => Err(ModelError::Malformed("connection dropped".into())),
                Script::FailAfter(_, status) => Err(http(status)),
            }
        })
    }

    fn generate_stream<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, ChunkStream> {
        let script = self.next(model, request, true);
        Box::pin(async move {
            let items: Vec<Result<GenerateContentResponse, ModelError>> = match script {
                Script::Fragments(parts) => parts
                    .into_iter()
                    .map(|p| Ok(GenerateContentResponse::from_text(p)))
                    .collect(),
                Script::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
                Script::Single(resp) => vec![Ok(resp)],
                Script::Status(status) => return Err(http(status)),
                Script::BreakAfter(parts) => parts
                    .into_iter()
                    .map(|p| Ok(GenerateContentResponse::from_text(p)))
                    .chain(std::iter::once(Err(ModelError::Malformed(
                        "connection dropped".into(),
                    ))))
                    .collect(),
                Script::FailAfter(parts, status) => parts
                    .into_iter()
                    .map(|p| Ok(GenerateContentResponse::from_text(p)))
                    .chain(std::iter::once(Err(http(status))))
                    .collect(),
            };
            let stream: ChunkStream = Box::pin(futures::stream::iter(items));
            Ok(stream)
        })
    }
}
