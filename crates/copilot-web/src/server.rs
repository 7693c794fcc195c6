//! Axum server setup and router construction.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;

use crate::api;
use crate::session::Session;
use crate::ws;

/// Build the full axum router.
///
/// The router serves:
/// - WebSocket at `/ws`
/// - REST API at `/api/*`
/// - Optional static files for the browser front end
pub fn build_router(session: Session, static_dir: Option<PathBuf>) -> Router {
    // The front end may be served from another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/diagnosis", post(api::post_diagnosis))
        .route("/api/solutions", post(api::post_solutions))
        .route("/api/response", post(api::post_response))
        .route("/api/state", get(api::get_state))
        .route("/api/submit", post(api::post_submit))
        .route("/api/cancel", post(api::post_cancel))
        .route("/api/clear", post(api::post_clear))
        .route("/api/export", get(api::get_export))
        .with_state(session)
        .layer(cors);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
}

/// Bind `bind_addr`, serve `router` on a background task and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Web server stopped: {e}");
        }
    });

    Ok(addr)
}
