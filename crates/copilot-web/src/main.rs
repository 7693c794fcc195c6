//! Counselor copilot web server.
//!
//! Serves the stage endpoints, the shared session API and the WebSocket
//! feed. Model credentials come from flags or the environment (a `.env`
//! file in the working directory is loaded first).
//!
//! # Usage
//!
//! ```bash
//! GEMINI_API_KEY=... copilot-web
//! GOOGLE_CLOUD_PROJECT=my-project GOOGLE_ACCESS_TOKEN=... copilot-web --port 8080
//! GEMINI_API_KEY=... copilot-web --static-dir ./frontend/out --no-export
//! ```
//!
//! ## Driving a run
//!
//! **WebSocket** (connect to `/ws`):
//! ```json
//! {"type": "submit", "patientContext": "25-year-old with work stress and insomnia"}
//! ```
//!
//! **REST** (`POST /api/submit`, then poll `GET /api/state`):
//! ```json
//! {"patientContext": "25-year-old with work stress and insomnia"}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use copilot_rs::cli::{ModelArgs, init_tracing};
use copilot_rs::ui::Features;
use copilot_web::{WebConfig, spawn_web};
use tracing::info;

/// Web server for the counselor copilot.
#[derive(Parser)]
#[command(name = "copilot-web", about = "HTTP and WebSocket server for the counselor copilot")]
struct Args {
    /// Port for the web server.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// Serve static front-end files from this directory.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Disable the "Clear Patient Data" action.
    #[arg(long)]
    no_clear: bool,

    /// Disable the summary export download.
    #[arg(long)]
    no_export: bool,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let pipeline = args.model.build_pipeline().map_err(|e| e.to_string())?;
    let stages = pipeline.stages();
    info!(
        diagnosis = %stages.diagnosis.model,
        solutions = %stages.solutions.model,
        response = %stages.response.model,
        "Pipeline configured"
    );

    let config = WebConfig {
        bind_addr: ([127, 0, 0, 1], args.port).into(),
        static_dir: args.static_dir,
        features: Features {
            clear: !args.no_clear,
            export: !args.no_export,
        },
        ..Default::default()
    };
    let (addr, _session) = spawn_web(Arc::new(pipeline), config)
        .await
        .map_err(|e| format!("failed to start server: {e}"))?;
    println!("Web UI: http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown: {e}"))?;
    info!("Shutting down");
    Ok(())
}
