//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the CORS and tracing layers, and the OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{EndLessonPayload, ErrorResponse, HealthResponse, RosterResponse, StreamError},
    state::AppState,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use rehearsal_core::{
    analyzer::LessonSetupRequest,
    coaching::{QuestionType, TeacherFeedback},
    lesson::{ConversationMessage, LessonContext, StudentApproach, TeacherPrompt},
    orchestrator::ClassroomResponse,
    profile::StudentSummary,
    student::StudentResponse,
    summary::{EndLessonResponse, LessonSummary, NextSteps, StrengthsAndGrowth},
};
use regex::Regex;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_students,
        handlers::ask,
        handlers::ask_with_audio,
        handlers::setup_lesson,
        handlers::end_lesson,
    ),
    components(
        schemas(
            TeacherPrompt, LessonContext, StudentApproach, ConversationMessage,
            StudentResponse, ClassroomResponse, TeacherFeedback, QuestionType,
            LessonSetupRequest, EndLessonPayload, EndLessonResponse, LessonSummary,
            StrengthsAndGrowth, NextSteps, StudentSummary, RosterResponse,
            HealthResponse, ErrorResponse, StreamError
        )
    ),
    tags(
        (name = "Classroom Rehearsal API", description = "Simulated students and coaching for rehearsing math discussions")
    )
)]
pub struct ApiDoc;

/// Builds the CORS layer from an explicit origin list and an optional pattern.
pub fn cors_layer(origins: &[String], pattern: Option<Regex>) -> CorsLayer {
    let exact: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        if exact.iter().any(|o| o == origin) {
            return true;
        }
        match (&pattern, origin.to_str()) {
            (Some(re), Ok(origin)) => re.is_match(origin),
            _ => false,
        }
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/", get(handlers::health))
        .route("/students", get(handlers::list_students))
        .route("/ask", post(handlers::ask))
        .route("/ask/with-audio", post(handlers::ask_with_audio))
        .route("/lesson/setup", post(handlers::setup_lesson))
        .route("/lesson/end", post(handlers::end_lesson))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
}
