//! One call per stage, whatever the invocation mode.
//!
//! [`ModelAdapter`] turns a [`StageConfig`] and a rendered prompt into the
//! stage's final text. Streamed replies are concatenated in arrival order;
//! single-shot replies yield the first candidate's text. Callers never see
//! which mode a stage used.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::api::backend::ModelBackend;
use crate::api::retry::RetryConfig;
use crate::stage::StageConfig;
use crate::{GenerateContentRequest, ModelError, NO_RESPONSE_FALLBACK};

/// Progress of a stage call as seen by a live observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveUpdate<'a> {
    /// The next piece of reply text.
    Text(&'a str),
    /// The previous attempt failed and is being retried. Text reported so
    /// far is void.
    Restart { attempt: u32 },
}

/// Invokes the model for a stage and accumulates the reply into a string.
#[derive(Clone)]
pub struct ModelAdapter {
    backend: Arc<dyn ModelBackend>,
    retry: RetryConfig,
}

impl ModelAdapter {
    /// An adapter that never retries.
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Wrap invocations in a bounded retry policy for transient errors.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run a stage and return its accumulated text.
    pub async fn invoke(&self, config: &StageConfig, prompt: &str) -> Result<String, ModelError> {
        self.invoke_live(config, prompt, &mut |_| {}).await
    }

    /// Run a stage, reporting each text fragment to `on_update` as it
    /// arrives. Single-shot replies are reported as one fragment. Before a
    /// retry, [`LiveUpdate::Restart`] tells the observer to drop what it
    /// has shown.
    ///
    /// On error, whatever text was accumulated is discarded.
    pub async fn invoke_live(
        &self,
        config: &StageConfig,
        prompt: &str,
        on_update: &mut (dyn FnMut(LiveUpdate<'_>) + Send),
    ) -> Result<String, ModelError> {
        let request = config.build_request(prompt);
        let mut attempt = 0;

        loop {
            let result = {
                let mut on_fragment = |text: &str| on_update(LiveUpdate::Text(text));
                if config.streaming {
                    self.accumulate_stream(&config.model, &request, &mut on_fragment)
                        .await
                } else {
                    self.single_shot(&config.model, &request, &mut on_fragment)
                        .await
                }
            };

            match result {
                Err(e) if self.retry.allows(attempt) && e.is_transient() => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        stage = %config.stage,
                        attempt = attempt + 1,
                        "Transient model error, retrying in {:.1}s: {e}",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    on_update(LiveUpdate::Restart { attempt });
                }
                other => return other,
            }
        }
    }

    async fn accumulate_stream(
        &self,
        model: &str,
        request: &GenerateContentRequest,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, ModelError> {
        let mut stream = self.backend.generate_stream(model, request).await?;
        let mut text = String::new();
        let mut chunks = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            chunks += 1;
            match chunk.text() {
                Some(fragment) => {
                    on_fragment(&fragment);
                    text.push_str(&fragment);
                }
                None => debug!(
                    "Non-text stream chunk: {}",
                    serde_json::to_string(&chunk).unwrap_or_default()
                ),
            }
        }

        debug!("Accumulated {} chars from {chunks} chunk(s)", text.len());
        Ok(text)
    }

    async fn single_shot(
        &self,
        model: &str,
        request: &GenerateContentRequest,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, ModelError> {
        let resp = self.backend.generate(model, request).await?;
        if resp.candidates.is_empty() {
            return Err(ModelError::NoCandidates);
        }
        match resp.text() {
            Some(text) => {
                on_fragment(&text);
                Ok(text)
            }
            None => {
                debug!("Candidate carried no text, using fallback");
                Ok(NO_RESPONSE_FALLBACK.to_string())
            }
        }
    }
}
