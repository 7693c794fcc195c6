//! The seam between the pipeline and the model service.
//!
//! [`ModelBackend`] exposes the two invocation modes the stages use.
//! [`GeminiClient`] is the production implementation; tests substitute
//! scripted doubles.

use std::future::Future;
use std::pin::Pin;

use crate::api::streaming::ChunkStream;
use crate::{GenerateContentRequest, GenerateContentResponse, GeminiClient, ModelError};

/// Boxed future returned by [`ModelBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ModelError>> + Send + 'a>>;

/// A generative-model service.
pub trait ModelBackend: Send + Sync {
    /// One complete reply.
    fn generate<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, GenerateContentResponse>;

    /// A reply delivered as an ordered stream of chunks.
    fn generate_stream<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, ChunkStream>;
}

impl ModelBackend for GeminiClient {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, GenerateContentResponse> {
        Box::pin(self.generate_content(model, request))
    }

    fn generate_stream<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
    ) -> BackendFuture<'a, ChunkStream> {
        Box::pin(self.stream_generate_content(model, request))
    }
}
