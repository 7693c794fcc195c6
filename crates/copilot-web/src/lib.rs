//! HTTP and WebSocket front door for the counselor copilot pipeline.
//!
//! `copilot-web` serves three stateless stage endpoints (`/api/diagnosis`,
//! `/api/solutions`, `/api/response`) plus a single shared session that a
//! browser drives over REST or WebSocket: submit a context, watch the
//! stages stream in, cancel, clear, and export the summary.
//!
//! # Quick start
//!
//! ```ignore
//! use copilot_web::{WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let pipeline = Arc::new(model_args.build_pipeline()?);
//! let (addr, _session) = spawn_web(pipeline, WebConfig::default()).await?;
//! println!("Web UI: http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! Pipeline ──PipelineEvent──▶ WebBroadcastHandler ──WsMessage──▶ WebSocket clients
//!     │                                                                 │
//!     └──▶ UiEventHandler ──▶ Arc<Mutex<UiState>> ◀── Session ◀── REST / WS commands
//! ```

mod api;
pub mod broadcast;
mod server;
pub mod session;
pub mod snapshot;
#[cfg(test)]
mod test_support;
mod ws;

pub use api::ApiError;
pub use broadcast::{WebBroadcastHandler, WsMessage};
pub use session::Session;
pub use snapshot::UiStateSnapshot;

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use copilot_rs::pipeline::Pipeline;
use copilot_rs::ui::{Features, UiState};

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory of static front-end files served as the fallback route.
    ///
    /// If `None`, only API/WS endpoints are served.
    pub static_dir: Option<PathBuf>,
    /// Maximum WebSocket broadcast channel capacity. Default: 256.
    ///
    /// Clients that fall behind by this many messages receive a fresh
    /// state snapshot to resynchronize.
    pub broadcast_capacity: usize,
    /// Clear and export toggles. Disabled features answer 404.
    pub features: Features,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
            broadcast_capacity: 256,
            features: Features::default(),
        }
    }
}

/// Spawn the web server on a Tokio task.
///
/// Returns the bound address and the shared [`Session`], which embedding
/// code can use to drive or observe the same state the browser sees. The
/// server runs until the Tokio runtime shuts down.
pub async fn spawn_web(pipeline: Arc<Pipeline>, config: WebConfig) -> io::Result<(SocketAddr, Session)> {
    let ui_state = Arc::new(Mutex::new(UiState::with_features(config.features)));
    let (broadcast_tx, _) = tokio::sync::broadcast::channel(config.broadcast_capacity);
    let session = Session::new(pipeline, ui_state, broadcast_tx);

    let router = server::build_router(session.clone(), config.static_dir);
    let addr = server::start_server(router, config.bind_addr).await?;
    Ok((addr, session))
}
