//! API Models
//!
//! Request and response bodies that exist only at the HTTP boundary. Domain
//! types such as `TeacherPrompt` and `ClassroomResponse` come from the core
//! crate and are used as-is.

use rehearsal_core::{
    lesson::{ConversationMessage, LessonContext},
    profile::StudentSummary,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters accepted by the `/ask` endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AskQuery {
    /// Stream the classroom response and the coaching feedback as server-sent events.
    #[serde(default)]
    pub stream_feedback: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EndLessonPayload {
    pub lesson_context: LessonContext,
    pub conversation_transcript: Vec<ConversationMessage>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub message: String,
    #[schema(example = 3)]
    pub students_loaded: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RosterResponse {
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// Payload of the `error` server-sent event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StreamError {
    pub error: String,
}
