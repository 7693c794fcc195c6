//! Run the counselor pipeline once and print the summary.
//!
//! Credentials and models come from flags or the environment (a `.env` file
//! in the working directory is loaded first).
//!
//! # Examples
//!
//! ```sh
//! # Vertex AI
//! GOOGLE_CLOUD_PROJECT=my-project GOOGLE_ACCESS_TOKEN=$(gcloud auth print-access-token) \
//!   copilot --context "25-year-old with work stress and insomnia"
//!
//! # Gemini API, context from stdin, save the summary
//! cat notes.txt | GEMINI_API_KEY=... copilot --stdin --export ./summaries/
//!
//! # Tuned diagnosis endpoint, first two stages in parallel
//! copilot --context "..." --parallel \
//!   --diagnosis-model projects/123/locations/us-central1/endpoints/456
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use copilot_rs::cli::{ModelArgs, init_tracing};
use copilot_rs::prelude::*;
use copilot_rs::{FAILURE_MESSAGE, PipelineError};
use tracing::error;

/// Turn free-text patient context into problem areas, interventions and a
/// counselor-facing response.
#[derive(Parser)]
#[command(name = "copilot")]
struct Cli {
    /// Patient context to analyze
    #[arg(long)]
    context: Option<String>,

    /// Read patient context from stdin
    #[arg(long)]
    stdin: bool,

    /// Write the summary JSON to this file (or into this directory)
    #[arg(long)]
    export: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,
}

fn read_context(cli: &Cli) -> Result<String, String> {
    let piped = if cli.stdin {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        Some(buf)
    } else {
        None
    };

    match (&cli.context, piped) {
        (Some(text), Some(piped)) => Ok(format!("{text}\n\n{piped}")),
        (Some(text), None) => Ok(text.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --context, --stdin, or both".to_string()),
    }
}

/// Why a run ended early.
enum RunError {
    /// Bad input or setup. Shown to the user as-is.
    Usage(String),
    /// A stage failed. Only the apology reaches the user; detail goes to the log.
    Pipeline(PipelineError),
}

impl From<String> for RunError {
    fn from(message: String) -> Self {
        RunError::Usage(message)
    }
}

impl From<PipelineError> for RunError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(e) => RunError::Usage(e.to_string()),
            e => RunError::Pipeline(e),
        }
    }
}

impl RunError {
    /// The line shown to the user.
    fn user_message(&self) -> String {
        match self {
            RunError::Usage(message) => format!("Error: {message}"),
            RunError::Pipeline(_) => FAILURE_MESSAGE.to_string(),
        }
    }
}

fn print_list(title: &str, labels: &[String]) {
    println!("{title}:");
    for label in labels {
        println!("  - {label}");
    }
}

async fn run(cli: &Cli) -> Result<(), RunError> {
    let context = read_context(cli)?;
    let pipeline = cli.model.build_pipeline().map_err(|e| e.to_string())?;

    let progress = FnEventHandler::new(|event| match event {
        PipelineEvent::StageStarted { stage, .. } => eprintln!("\n[{stage}]"),
        PipelineEvent::TextDelta { text, .. } => eprint!("{text}"),
        _ => {}
    });
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(progress);

    let summary = pipeline.run(&context, &handler).await?;
    eprintln!();

    print_list("Problems identified", &summary.problems);
    print_list("Possible solutions", &summary.solutions);
    println!("\n{}", summary.response);

    if let Some(path) = &cli.export {
        let written = SummaryExport::from(&summary)
            .write_to(path)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        eprintln!("Saved summary to {}", written.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(&cli).await {
        match &err {
            RunError::Usage(_) => eprintln!("{}", err.user_message()),
            RunError::Pipeline(e) => {
                error!("Pipeline failed: {e}");
                eprintln!();
                println!("{}", err.user_message());
            }
        }
        process::exit(1);
    }
}
