//! Model service interaction: backend seam, streaming, invocation, retry.
//!
//! - [`backend`]: the [`ModelBackend`] trait with single-shot and streamed
//!   modes, implemented by [`GeminiClient`](crate::GeminiClient).
//! - [`streaming`]: SSE decoder for `streamGenerateContent?alt=sse`.
//! - [`adapter`]: [`ModelAdapter`], one call per stage returning the
//!   accumulated text regardless of mode.
//! - [`retry`]: opt-in exponential backoff for transient failures.

pub mod adapter;
pub mod backend;
pub mod retry;
pub mod streaming;

pub use adapter::{LiveUpdate, ModelAdapter};
pub use backend::{BackendFuture, ModelBackend};
pub use retry::RetryConfig;
pub use streaming::{ChunkStream, SseDecoder};
