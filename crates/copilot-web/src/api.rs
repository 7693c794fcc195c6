//! REST endpoint handlers.
//!
//! The three stage endpoints are stateless: each validates its body, calls
//! one stage and returns the raw model text. The session endpoints drive
//! the shared [`Session`].

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use copilot_rs::stage::Stage;
use copilot_rs::{PipelineError, ValidationError};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::session::Session;
use crate::snapshot::UiStateSnapshot;

/// Errors returned by the REST handlers as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A model call failed. Detail has already been logged.
    #[error("Failed to process {0} request")]
    Stage(Stage),
    #[error("{0}")]
    BadRequest(String),
    #[error("a pipeline run is already in progress")]
    Busy,
    #[error("{0}")]
    NotFound(&'static str),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Stage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Upstream detail is logged here and never reaches the client.
impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => ApiError::Validation(e),
            PipelineError::Busy => ApiError::Busy,
            PipelineError::Stage { stage, source } => {
                error!("Error in {stage} endpoint: {source}");
                ApiError::Stage(stage)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ── Body field extraction ─────────────────────────────────────────────

/// `patientContext` must be a string. Blankness is checked by the pipeline.
fn context_field(body: &Value) -> Result<&str, ValidationError> {
    body.get("patientContext")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingContext)
}

/// A non-empty array of strings.
fn label_array(body: &Value, key: &str, err: ValidationError) -> Result<Vec<String>, ValidationError> {
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| err.clone())?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(|| err.clone()))
        .collect()
}

// ── Stage endpoints ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DiagnosisReply {
    pub diagnosis: String,
}

#[derive(Serialize)]
pub struct SolutionsReply {
    pub solutions: String,
}

#[derive(Serialize)]
pub struct ResponseReply {
    pub response: String,
}

/// POST /api/diagnosis: raw comma-separated problem areas.
pub async fn post_diagnosis(
    State(session): State<Session>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DiagnosisReply>, ApiError> {
    let Json(body) = body?;
    let context = context_field(&body)?;
    let diagnosis = session
        .pipeline()
        .diagnose(context)
        .await?;
    Ok(Json(DiagnosisReply { diagnosis }))
}

/// POST /api/solutions: raw comma-separated interventions.
pub async fn post_solutions(
    State(session): State<Session>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SolutionsReply>, ApiError> {
    let Json(body) = body?;
    let context = context_field(&body)?;
    let solutions = session
        .pipeline()
        .suggest_solutions(context)
        .await?;
    Ok(Json(SolutionsReply { solutions }))
}

/// POST /api/response: counselor response from context and both lists.
pub async fn post_response(
    State(session): State<Session>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ResponseReply>, ApiError> {
    let Json(body) = body?;
    let context = context_field(&body)?;
    let diagnosis = label_array(&body, "diagnosis", ValidationError::InvalidDiagnosis)?;
    let solutions = label_array(&body, "solutions", ValidationError::InvalidSolutions)?;
    let response = session
        .pipeline()
        .compose_response(context, &diagnosis, &solutions)
        .await?;
    Ok(Json(ResponseReply { response }))
}

// ── Session endpoints ─────────────────────────────────────────────────

/// GET /api/state: Full session snapshot.
pub async fn get_state(State(session): State<Session>) -> Json<UiStateSnapshot> {
    Json(session.snapshot())
}

/// POST /api/submit: Start a run. 202 once started, 409 while busy.
pub async fn post_submit(
    State(session): State<Session>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    session.submit(context_field(&body)?)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/cancel: Abort the in-flight run. 404 when idle.
pub async fn post_cancel(State(session): State<Session>) -> Result<StatusCode, ApiError> {
    if session.cancel().await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("No run in progress"))
    }
}

/// POST /api/clear: Reset the session ("Clear Patient Data").
pub async fn post_clear(State(session): State<Session>) -> Result<StatusCode, ApiError> {
    if !session.clear_enabled() {
        return Err(ApiError::NotFound("Clear is disabled"));
    }
    session.clear()?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/export: Download the summary as a JSON attachment.
pub async fn get_export(State(session): State<Session>) -> Result<Response, ApiError> {
    let export = session
        .export()
        .ok_or(ApiError::NotFound("Export is disabled"))?;
    let body = export
        .to_json_pretty()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
