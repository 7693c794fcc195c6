//! The three-stage orchestrator.
//!
//! [`Pipeline::run`] validates the patient context, calls the diagnosis and
//! solutions stages, normalizes their comma-separated replies into labels
//! and feeds both lists to the response stage. Progress is reported as
//! [`PipelineEvent`]s; the first failure abandons the remaining stages.
//!
//! The stage operations are also exposed one at a time
//! ([`diagnose`](Pipeline::diagnose), [`suggest_solutions`](Pipeline::suggest_solutions),
//! [`compose_response`](Pipeline::compose_response)). Those return the raw
//! model text and back the HTTP endpoints.

pub mod events;

pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    PipelineEvent,
};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{LiveUpdate, ModelAdapter, ModelBackend, RetryConfig};
use crate::normalize::{is_insufficient_information, parse_label_list};
use crate::stage::prompt::{diagnosis_prompt, response_prompt, solutions_prompt};
use crate::stage::{Stage, StageConfig, StageConfigs};
use crate::{PipelineError, ValidationError};

// ── Inputs ─────────────────────────────────────────────────────────

/// Free-text description of the patient, as typed by the counselor.
///
/// Only blankness is checked. The text is kept verbatim (no trimming) and
/// inserted into prompts as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientContext(String);

impl PatientContext {
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::MissingContext);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Both lists must be present and non-empty before the response stage.
pub fn validate_lists(problems: &[String], solutions: &[String]) -> Result<(), ValidationError> {
    if problems.is_empty() {
        return Err(ValidationError::InvalidDiagnosis);
    }
    if solutions.is_empty() {
        return Err(ValidationError::InvalidSolutions);
    }
    Ok(())
}

// ── State ──────────────────────────────────────────────────────────

/// Where a run is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    AwaitingDiagnosis,
    AwaitingSolutions,
    AwaitingResponse,
    Failed,
}

impl PipelineState {
    /// Any state other than `Idle` means a run is in flight.
    pub fn is_busy(self) -> bool {
        self != PipelineState::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::AwaitingDiagnosis => "awaiting_diagnosis",
            PipelineState::AwaitingSolutions => "awaiting_solutions",
            PipelineState::AwaitingResponse => "awaiting_response",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavior switches for [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Run diagnosis and solutions concurrently. Both take only the
    /// context, so neither waits on the other; response still waits on both.
    pub parallel_first_stages: bool,
}

/// The outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub context: String,
    pub problems: Vec<String>,
    pub solutions: Vec<String>,
    pub response: String,
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Sequences the three stages against a model backend.
///
/// Cheap to share: wrap in an `Arc` and call from as many tasks as needed.
/// A `Pipeline` holds no per-run state; in-flight guarding belongs to the
/// caller's session.
#[derive(Clone)]
pub struct Pipeline {
    adapter: ModelAdapter,
    stages: Arc<StageConfigs>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn ModelBackend>, stages: StageConfigs) -> Self {
        Self {
            adapter: ModelAdapter::new(backend),
            stages: Arc::new(stages),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.adapter = self.adapter.with_retry(retry);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stages(&self) -> &StageConfigs {
        &self.stages
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Raw diagnosis text for a context.
    pub async fn diagnose(&self, context: &str) -> Result<String, PipelineError> {
        let context = PatientContext::parse(context)?;
        self.call(&self.stages.diagnosis, &diagnosis_prompt(context.as_str()), &NoopHandler)
            .await
    }

    /// Raw solutions text for a context.
    pub async fn suggest_solutions(&self, context: &str) -> Result<String, PipelineError> {
        let context = PatientContext::parse(context)?;
        self.call(&self.stages.solutions, &solutions_prompt(context.as_str()), &NoopHandler)
            .await
    }

    /// Raw counselor response for a context and both label lists.
    pub async fn compose_response(
        &self,
        context: &str,
        problems: &[String],
        solutions: &[String],
    ) -> Result<String, PipelineError> {
        let context = PatientContext::parse(context)?;
        validate_lists(problems, solutions)?;
        self.call(
            &self.stages.response,
            &response_prompt(context.as_str(), problems, solutions),
            &NoopHandler,
        )
        .await
    }

    /// Run all three stages for `context`, reporting progress to `handler`.
    ///
    /// A blank context is rejected before any event is emitted. Once a run
    /// has started, any failure emits [`PipelineEvent::Failed`] and moves
    /// the state through `Failed` back to `Idle`. Lists produced before the
    /// failure have already been reported and are not retracted.
    pub async fn run(
        &self,
        context: &str,
        handler: &dyn EventHandler,
    ) -> Result<PipelineSummary, PipelineError> {
        let context = PatientContext::parse(context)?;
        handler.on_event(&PipelineEvent::Submitted {
            context: context.as_str(),
        });

        let mut tracker = StateTracker {
            state: PipelineState::Idle,
            handler,
        };

        match self.run_stages(&context, &mut tracker).await {
            Ok(summary) => {
                tracker.transition(PipelineState::Idle);
                handler.on_event(&PipelineEvent::Finished { success: true });
                Ok(summary)
            }
            Err(error) => {
                tracker.transition(PipelineState::Failed);
                handler.on_event(&PipelineEvent::Failed { error: &error });
                tracker.transition(PipelineState::Idle);
                handler.on_event(&PipelineEvent::Finished { success: false });
                Err(error)
            }
        }
    }

    async fn run_stages(
        &self,
        context: &PatientContext,
        tracker: &mut StateTracker<'_>,
    ) -> Result<PipelineSummary, PipelineError> {
        let handler = tracker.handler;

        tracker.transition(PipelineState::AwaitingDiagnosis);
        let (problems, solutions) = if self.options.parallel_first_stages {
            let (problems, solutions) = tokio::join!(
                self.list_stage(Stage::Diagnosis, context, handler),
                self.list_stage(Stage::Solutions, context, handler),
            );
            (problems?, solutions?)
        } else {
            let problems = self.list_stage(Stage::Diagnosis, context, handler).await?;
            tracker.transition(PipelineState::AwaitingSolutions);
            let solutions = self.list_stage(Stage::Solutions, context, handler).await?;
            (problems, solutions)
        };

        tracker.transition(PipelineState::AwaitingResponse);
        validate_lists(&problems, &solutions)?;
        let config = &self.stages.response;
        handler.on_event(&PipelineEvent::StageStarted {
            stage: Stage::Response,
            model: &config.model,
        });
        let response = self
            .call(
                config,
                &response_prompt(context.as_str(), &problems, &solutions),
                handler,
            )
            .await?;
        handler.on_event(&PipelineEvent::ResponseReady(&response));

        Ok(PipelineSummary {
            context: context.as_str().to_string(),
            problems,
            solutions,
            response,
        })
    }

    /// Run a list-producing stage and normalize its reply.
    async fn list_stage(
        &self,
        stage: Stage,
        context: &PatientContext,
        handler: &dyn EventHandler,
    ) -> Result<Vec<String>, PipelineError> {
        let config = self.stages.for_stage(stage);
        let prompt = match stage {
            Stage::Solutions => solutions_prompt(context.as_str()),
            _ => diagnosis_prompt(context.as_str()),
        };

        handler.on_event(&PipelineEvent::StageStarted {
            stage,
            model: &config.model,
        });
        let raw = self.call(config, &prompt, handler).await?;
        if is_insufficient_information(&raw) {
            info!("[{stage}] model reported insufficient information");
        }

        let labels = parse_label_list(&raw);
        debug!("[{stage}] {} raw chars → {} label(s)", raw.len(), labels.len());
        match stage {
            Stage::Solutions => handler.on_event(&PipelineEvent::SolutionsSuggested(&labels)),
            _ => handler.on_event(&PipelineEvent::ProblemsIdentified(&labels)),
        }
        Ok(labels)
    }

    async fn call(
        &self,
        config: &StageConfig,
        prompt: &str,
        handler: &dyn EventHandler,
    ) -> Result<String, PipelineError> {
        let stage = config.stage;
        self.adapter
            .invoke_live(config, prompt, &mut |update| match update {
                LiveUpdate::Text(text) => {
                    handler.on_event(&PipelineEvent::TextDelta { stage, text })
                }
                // Restarting the stage clears text shown for the failed attempt.
                LiveUpdate::Restart { .. } => handler.on_event(&PipelineEvent::StageStarted {
                    stage,
                    model: &config.model,
                }),
            })
            .await
            .map_err(|source| PipelineError::Stage { stage, source })
    }
}

/// Emits `StateChanged` for every transition of one run.
struct StateTracker<'a> {
    state: PipelineState,
    handler: &'a dyn EventHandler,
}

impl StateTracker<'_> {
    fn transition(&mut self, to: PipelineState) {
        let from = std::mem::replace(&mut self.state, to);
        self.handler
            .on_event(&PipelineEvent::StateChanged { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Script, ScriptedBackend};
    use crate::{GenerateContentResponse, ModelError};
    use std::sync::Mutex;

    const CONTEXT: &str = "25-year-old with work stress and insomnia";

    fn scripted() -> ScriptedBackend {
        ScriptedBackend::new()
            .script("diag", Script::Fragments(vec!["anxiety, ", "insomnia"]))
            .script("sol", Script::Fragments(vec!["cbt, sleep hygiene"]))
            .script(
                "resp",
                Script::Single(GenerateContentResponse::from_text(
                    "Consider **CBT** for anxiety.",
                )),
            )
    }

    fn pipeline(backend: &Arc<ScriptedBackend>) -> Pipeline {
        Pipeline::new(backend.clone(), StageConfigs::new("diag", "sol", "resp"))
    }

    /// Records events as short strings.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl EventHandler for Recorder {
        fn on_event(&self, event: &PipelineEvent<'_>) {
            let line = match event {
                PipelineEvent::Submitted { .. } => "submitted".to_string(),
                PipelineEvent::StateChanged { to, .. } => format!("state:{to}"),
                PipelineEvent::StageStarted { stage, .. } => format!("start:{stage}"),
                PipelineEvent::TextDelta { .. } => return,
                PipelineEvent::ProblemsIdentified(l) => format!("problems:{}", l.join("|")),
                PipelineEvent::SolutionsSuggested(l) => format!("solutions:{}", l.join("|")),
                PipelineEvent::ResponseReady(_) => "response".to_string(),
                PipelineEvent::Failed { .. } => "failed".to_string(),
                PipelineEvent::Finished { success } => format!("finished:{success}"),
            };
            self.0.lock().unwrap().push(line);
        }
    }

    impl Recorder {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn patient_context_rejects_blank_but_keeps_text_verbatim() {
        assert_eq!(PatientContext::parse(""), Err(ValidationError::MissingContext));
        assert_eq!(
            PatientContext::parse(" \n\t "),
            Err(ValidationError::MissingContext)
        );
        let ctx = PatientContext::parse("  stressed  ").unwrap();
        assert_eq!(ctx.as_str(), "  stressed  ");
    }

    #[test]
    fn validate_lists_requires_both_non_empty() {
        let some = vec!["Anxiety".to_string()];
        assert_eq!(validate_lists(&[], &some), Err(ValidationError::InvalidDiagnosis));
        assert_eq!(validate_lists(&some, &[]), Err(ValidationError::InvalidSolutions));
        assert!(validate_lists(&some, &some).is_ok());
    }

    #[tokio::test]
    async fn end_to_end_run() {
        let backend = Arc::new(scripted());
        let recorder = Recorder::default();

        let summary = pipeline(&backend).run(CONTEXT, &recorder).await.unwrap();

        assert_eq!(summary.problems, ["Anxiety", "Insomnia"]);
        assert_eq!(summary.solutions, ["Cbt", "Sleep Hygiene"]);
        assert_eq!(summary.response, "Consider **CBT** for anxiety.");

        let prompt = backend.last_prompt("resp").unwrap();
        assert!(prompt.contains(CONTEXT));
        assert!(prompt.contains("Anxiety, Insomnia"));
        assert!(prompt.contains("Cbt, Sleep Hygiene"));

        assert_eq!(
            recorder.lines(),
            [
                "submitted",
                "state:awaiting_diagnosis",
                "start:diagnosis",
                "problems:Anxiety|Insomnia",
                "state:awaiting_solutions",
                "start:solutions",
                "solutions:Cbt|Sleep Hygiene",
                "state:awaiting_response",
                "start:response",
                "response",
                "state:idle",
                "finished:true",
            ]
        );
    }

    #[tokio::test]
    async fn blank_context_makes_no_calls_and_emits_nothing() {
        let backend = Arc::new(scripted());
        let recorder = Recorder::default();

        let err = pipeline(&backend).run("   ", &recorder).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingContext)
        ));
        assert!(recorder.lines().is_empty());
        for model in ["diag", "sol", "resp"] {
            assert_eq!(backend.calls(model), 0);
        }
    }

    #[tokio::test]
    async fn diagnosis_failure_skips_later_stages() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .script("diag", Script::Status(500))
                .script("sol", Script::Fragments(vec!["cbt"]))
                .script("resp", Script::Single(GenerateContentResponse::from_text("x"))),
        );
        let recorder = Recorder::default();

        let err = pipeline(&backend).run(CONTEXT, &recorder).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Diagnosis));
        assert_eq!(backend.calls("sol"), 0);
        assert_eq!(backend.calls("resp"), 0);
        let lines = recorder.lines();
        assert_eq!(
            lines[lines.len() - 4..],
            ["state:failed", "failed", "state:idle", "finished:false"]
        );
    }

    #[tokio::test]
    async fn response_failure_keeps_reported_lists() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .script("diag", Script::Fragments(vec!["anxiety"]))
                .script("sol", Script::Fragments(vec!["cbt"]))
                .script("resp", Script::Status(503)),
        );
        let recorder = Recorder::default();

        let err = pipeline(&backend).run(CONTEXT, &recorder).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: Stage::Response,
                source: ModelError::Http { status: 503, .. }
            }
        ));
        let lines = recorder.lines();
        assert!(lines.contains(&"problems:Anxiety".to_string()));
        assert!(lines.contains(&"solutions:Cbt".to_string()));
    }

    #[tokio::test]
    async fn empty_list_fails_before_response_call() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .script("diag", Script::Fragments(vec![" , "]))
                .script("sol", Script::Fragments(vec!["cbt"]))
                .script("resp", Script::Single(GenerateContentResponse::from_text("x"))),
        );

        let err = pipeline(&backend)
            .run(CONTEXT, &NoopHandler)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidDiagnosis)
        ));
        assert_eq!(backend.calls("resp"), 0);
    }

    #[tokio::test]
    async fn insufficient_information_is_a_result() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .script(
                    "diag",
                    Script::Fragments(vec!["Insufficient information to determine problem areas."]),
                )
                .script("sol", Script::Fragments(vec!["gather more history"]))
                .script("resp", Script::Single(GenerateContentResponse::from_text("ok"))),
        );

        let summary = pipeline(&backend).run("hi", &NoopHandler).await.unwrap();
        assert_eq!(
            summary.problems,
            ["Insufficient Information To Determine Problem Areas."]
        );
    }

    #[tokio::test]
    async fn parallel_mode_skips_awaiting_solutions() {
        let backend = Arc::new(scripted());
        let recorder = Recorder::default();

        let summary = pipeline(&backend)
            .with_options(PipelineOptions {
                parallel_first_stages: true,
            })
            .run(CONTEXT, &recorder)
            .await
            .unwrap();

        assert_eq!(summary.problems, ["Anxiety", "Insomnia"]);
        assert_eq!(summary.solutions, ["Cbt", "Sleep Hygiene"]);
        let lines = recorder.lines();
        assert!(!lines.contains(&"state:awaiting_solutions".to_string()));
        assert!(lines.contains(&"state:awaiting_response".to_string()));
    }

    #[tokio::test]
    async fn parallel_mode_failure_still_reports_other_list() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .script("diag", Script::Status(500))
                .script("sol", Script::Fragments(vec!["cbt"])),
        );
        let recorder = Recorder::default();

        let result = pipeline(&backend)
            .with_options(PipelineOptions {
                parallel_first_stages: true,
            })
            .run(CONTEXT, &recorder)
            .await;

        assert!(result.is_err());
        assert!(recorder.lines().contains(&"solutions:Cbt".to_string()));
        assert_eq!(backend.calls("resp"), 0);
    }

    #[tokio::test]
    async fn stage_operations_return_raw_text() {
        let backend = Arc::new(scripted());
        let pipeline = pipeline(&backend);

        assert_eq!(pipeline.diagnose(CONTEXT).await.unwrap(), "anxiety, insomnia");
        assert_eq!(
            pipeline.suggest_solutions(CONTEXT).await.unwrap(),
            "cbt, sleep hygiene"
        );

        let problems = vec!["Anxiety".to_string()];
        let solutions = vec!["Cbt".to_string()];
        assert_eq!(
            pipeline
                .compose_response(CONTEXT, &problems, &solutions)
                .await
                .unwrap(),
            "Consider **CBT** for anxiety."
        );
    }

    #[tokio::test]
    async fn compose_response_validates_before_calling() {
        let backend = Arc::new(scripted());
        let pipeline = pipeline(&backend);
        let labels = vec!["Anxiety".to_string()];

        assert!(matches!(
            pipeline.compose_response(CONTEXT, &[], &labels).await,
            Err(PipelineError::Validation(ValidationError::InvalidDiagnosis))
        ));
        assert!(matches!(
            pipeline.compose_response("", &labels, &labels).await,
            Err(PipelineError::Validation(ValidationError::MissingContext))
        ));
        assert_eq!(backend.calls("resp"), 0);
    }

    #[tokio::test]
    async fn text_deltas_are_forwarded() {
        let backend = Arc::new(scripted());
        let deltas = Arc::new(Mutex::new(String::new()));
        let sink = deltas.clone();
        let handler = FnEventHandler::new(move |event| {
            if let PipelineEvent::TextDelta {
                stage: Stage::Diagnosis,
                text,
            } = event
            {
                sink.lock().unwrap().push_str(text);
            }
        });

        pipeline(&backend).run(CONTEXT, &handler).await.unwrap();
        assert_eq!(*deltas.lock().unwrap(), "anxiety, insomnia");
    }

    #[tokio::test]
    async fn retried_stage_restarts_live_text() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .script("diag", Script::FailAfter(vec!["anxi"], 503))
                .script("diag", Script::Fragments(vec!["anxiety, ", "insomnia"]))
                .script("sol", Script::Fragments(vec!["cbt"]))
                .script("resp", Script::Single(GenerateContentResponse::from_text("ok"))),
        );
        let live = Arc::new(Mutex::new(String::new()));
        let shown = Arc::new(Mutex::new(None));
        let (buffer, seen) = (live.clone(), shown.clone());
        let handler = FnEventHandler::new(move |event| match event {
            PipelineEvent::StageStarted { .. } => buffer.lock().unwrap().clear(),
            PipelineEvent::TextDelta { text, .. } => buffer.lock().unwrap().push_str(text),
            PipelineEvent::ProblemsIdentified(_) => {
                *seen.lock().unwrap() = Some(buffer.lock().unwrap().clone())
            }
            _ => {}
        });

        pipeline(&backend)
            .with_retry(RetryConfig {
                base_delay: std::time::Duration::from_millis(1),
                jitter: false,
                ..RetryConfig::with_retries(1)
            })
            .run(CONTEXT, &handler)
            .await
            .unwrap();

        assert_eq!(shown.lock().unwrap().as_deref(), Some("anxiety, insomnia"));
        assert_eq!(backend.calls("diag"), 2);
    }
}
