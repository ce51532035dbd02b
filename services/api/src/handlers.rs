//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for classroom
//! rehearsal. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Json, Response,
        sse::{KeepAlive, Sse},
    },
};
use rehearsal_core::{
    analyzer::{AnalyzerError, LessonSetupRequest},
    lesson::{LessonContext, TeacherPrompt},
    orchestrator::ClassroomResponse,
    summary::EndLessonResponse,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::{
    models::{AskQuery, EndLessonPayload, ErrorResponse, HealthResponse, RosterResponse},
    state::AppState,
    stream::classroom_events,
};

pub enum ApiError {
    BadRequest(String),
    /// The end-of-lesson report could not be produced. The reason is shown.
    SummaryFailed(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::SummaryFailed(message) => {
                error!("Lesson summary failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Unwraps a JSON body, turning extractor rejections into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Either the classroom response as JSON or the two-phase event stream.
async fn ask_classroom(
    state: Arc<AppState>,
    prompt: TeacherPrompt,
    include_audio: bool,
    stream_feedback: bool,
) -> Result<Response, ApiError> {
    if stream_feedback {
        let sse = Sse::new(classroom_events(state, prompt, include_audio))
            .keep_alive(KeepAlive::default());
        let headers = [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ];
        return Ok((headers, sse).into_response());
    }

    let classroom = state.orchestrator.dispatch(&prompt, include_audio).await?;
    Ok(Json(classroom).into_response())
}

/// Service liveness and roster size.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Classroom rehearsal API is running".to_string(),
        students_loaded: state.profiles.len(),
    })
}

/// List the students in the classroom.
#[utoipa::path(
    get,
    path = "/students",
    responses(
        (status = 200, description = "The loaded student roster", body = RosterResponse)
    )
)]
pub async fn list_students(State(state): State<Arc<AppState>>) -> Json<RosterResponse> {
    Json(RosterResponse {
        students: state.profiles.iter().map(|p| p.summary()).collect(),
    })
}

/// Ask every student the teacher's prompt.
///
/// With `stream_feedback=true` the response is a `text/event-stream` of
/// `students_response`, `teacher_feedback` and `done` events.
#[utoipa::path(
    post,
    path = "/ask",
    request_body = TeacherPrompt,
    params(AskQuery),
    responses(
        (status = 200, description = "Every student's reaction", body = ClassroomResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(stream = query.stream_feedback))]
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AskQuery>,
    payload: Result<Json<TeacherPrompt>, JsonRejection>,
) -> Result<Response, ApiError> {
    let prompt = json_body(payload)?;
    info!(prompt_len = prompt.prompt.len(), "Teacher prompt received");
    ask_classroom(state, prompt, false, query.stream_feedback).await
}

/// Ask every student the teacher's prompt and voice their answers.
#[utoipa::path(
    post,
    path = "/ask/with-audio",
    request_body = TeacherPrompt,
    params(AskQuery),
    responses(
        (status = 200, description = "Every student's reaction with base64 MP3 audio", body = ClassroomResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(stream = query.stream_feedback))]
pub async fn ask_with_audio(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AskQuery>,
    payload: Result<Json<TeacherPrompt>, JsonRejection>,
) -> Result<Response, ApiError> {
    let prompt = json_body(payload)?;
    info!(prompt_len = prompt.prompt.len(), "Teacher prompt received for audio");
    ask_classroom(state, prompt, true, query.stream_feedback).await
}

/// Analyze a lesson plan into a lesson context.
#[utoipa::path(
    post,
    path = "/lesson/setup",
    request_body = LessonSetupRequest,
    responses(
        (status = 200, description = "The lesson context to send with every prompt", body = LessonContext),
        (status = 400, description = "No lesson plan, or an undecodable PDF", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn setup_lesson(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LessonSetupRequest>, JsonRejection>,
) -> Result<Json<LessonContext>, ApiError> {
    let request = json_body(payload)?;
    let context = state
        .analyzer
        .analyze(&request, &state.profiles)
        .await
        .map_err(|e| match e {
            AnalyzerError::EmptyLessonPlan | AnalyzerError::InvalidPdf(_) => {
                ApiError::BadRequest(e.to_string())
            }
            AnalyzerError::Generation(_) => ApiError::InternalServerError(e.into()),
        })?;
    Ok(Json(context))
}

/// Produce the end-of-lesson report.
///
/// A report that cannot be produced is a 500 with the reason, never a partial
/// report.
#[utoipa::path(
    post,
    path = "/lesson/end",
    request_body = EndLessonPayload,
    responses(
        (status = 200, description = "The end-of-lesson report", body = EndLessonResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "The report could not be generated", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn end_lesson(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EndLessonPayload>, JsonRejection>,
) -> Result<Json<EndLessonResponse>, ApiError> {
    let payload = json_body(payload)?;
    let report = state
        .summarizer
        .summarize(&payload.lesson_context, &payload.conversation_transcript)
        .await
        .map_err(|e| ApiError::SummaryFailed(e.to_string()))?;
    Ok(Json(report))
}
