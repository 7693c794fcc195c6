//! Server-Sent Events (SSE) streaming for `streamGenerateContent?alt=sse`.
//!
//! Each `data:` line of the stream carries one complete
//! [`GenerateContentResponse`] chunk. [`SseDecoder`] turns raw body bytes
//! into chunks; [`GeminiClient::stream_generate_content`] wraps the HTTP
//! body in a [`ChunkStream`] so callers can consume chunks as they arrive.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::Stream;
use tracing::{debug, trace};

use crate::{GenerateContentRequest, GenerateContentResponse, GeminiClient, ModelError};

/// An ordered stream of reply chunks. The first `Err` ends the stream.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<GenerateContentResponse, ModelError>> + Send>>;

/// Incremental SSE decoder.
///
/// Buffers raw bytes until a full line is available so chunk boundaries in
/// the middle of a line (or of a multi-byte character) are harmless.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed body bytes; returns every chunk completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<GenerateContentResponse, ModelError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(item) = parse_line(&line) {
                out.push(item);
            }
        }
        out
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Result<GenerateContentResponse, ModelError>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

/// Parse one SSE line. Comments, blank lines and non-data fields yield `None`.
fn parse_line(line: &[u8]) -> Option<Result<GenerateContentResponse, ModelError>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    trace!("SSE data: {data}");
    Some(
        serde_json::from_str::<GenerateContentResponse>(data)
            .map_err(|e| ModelError::Malformed(format!("bad stream chunk: {e}"))),
    )
}

struct StreamState {
    resp: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<Result<GenerateContentResponse, ModelError>>,
    finished: bool,
}

impl GeminiClient {
    /// Open a streamed `streamGenerateContent` request.
    ///
    /// Non-success statuses fail before any chunk is yielded. Once the
    /// stream yields an error it ends.
    pub async fn stream_generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<ChunkStream, ModelError> {
        let url = self
            .endpoint
            .method_url(model, "streamGenerateContent?alt=sse");
        debug!(
            "Model request: model={}, contents={}, streaming=true",
            model,
            body.contents.len()
        );

        let resp = self.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::Http { status, body: text });
        }

        let state = StreamState {
            resp,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        let stream = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    if item.is_err() {
                        st.finished = true;
                        st.pending.clear();
                    }
                    return Some((item, st));
                }
                if st.finished {
                    return None;
                }
                match st.resp.chunk().await {
                    Ok(Some(bytes)) => st.pending.extend(st.decoder.push(&bytes)),
                    Ok(None) => {
                        st.finished = true;
                        st.pending.extend(st.decoder.finish());
                        debug!("Stream completed");
                    }
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(ModelError::Transport(e)), st));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
