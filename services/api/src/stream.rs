//! Two-Phase Classroom Stream
//!
//! The streamed `/ask` response emits the classroom's reaction first and only
//! then starts the coaching call, so the UI can render students immediately.
//! The stream is lazy: each stage's upstream work begins when the stage is
//! polled. A client that disconnects after `students_response` therefore
//! never triggers the coaching call.
//!
//! The HTTP body keeps polling for chunks until one is not ready, and only
//! then writes what it has buffered. The coaching stage therefore pauses for
//! [`FLUSH_GRACE`] before calling the coach, so `students_response` is on the
//! wire first.
//!
//! Events, in order:
//! `students_response` (ClassroomResponse), `teacher_feedback` (TeacherFeedback),
//! `done` (`{}`). If the classroom dispatch itself fails, a single `error`
//! event carrying `{"error": "..."}` replaces the whole sequence.

use crate::{models::StreamError, state::AppState};
use axum::response::sse::Event;
use futures::{Stream, stream};
use rehearsal_core::{lesson::TeacherPrompt, orchestrator::ClassroomResponse};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub const STUDENTS_RESPONSE: &str = "students_response";
pub const TEACHER_FEEDBACK: &str = "teacher_feedback";
pub const DONE: &str = "done";
pub const ERROR: &str = "error";

/// Pause between `students_response` and the coaching call.
pub const FLUSH_GRACE: Duration = Duration::from_millis(100);

enum Stage {
    Students,
    Coaching(ClassroomResponse),
    Done,
    Finished,
}

struct StreamState {
    app: Arc<AppState>,
    prompt: TeacherPrompt,
    include_audio: bool,
    stage: Stage,
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| error_event(format!("Failed to encode {name}: {e}")))
}

fn error_event(message: String) -> Event {
    let payload = StreamError { error: message };
    Event::default()
        .event(ERROR)
        .json_data(&payload)
        .unwrap_or_else(|_| Event::default().event(ERROR).data("{}"))
}

/// Builds the event stream for one prompt.
pub fn classroom_events(
    app: Arc<AppState>,
    prompt: TeacherPrompt,
    include_audio: bool,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let initial = StreamState {
        app,
        prompt,
        include_audio,
        stage: Stage::Students,
    };

    stream::unfold(initial, |mut state| async move {
        let event = match std::mem::replace(&mut state.stage, Stage::Finished) {
            Stage::Students => {
                match state
                    .app
                    .orchestrator
                    .dispatch(&state.prompt, state.include_audio)
                    .await
                {
                    Ok(classroom) => {
                        let event = json_event(STUDENTS_RESPONSE, &classroom);
                        state.stage = Stage::Coaching(classroom);
                        event
                    }
                    Err(e) => {
                        error!(error = %e, "Classroom dispatch failed while streaming");
                        error_event(e.to_string())
                    }
                }
            }
            Stage::Coaching(classroom) => {
                tokio::time::sleep(FLUSH_GRACE).await;
                debug!("Students delivered, requesting coaching feedback");
                let feedback = state.app.coach.evaluate(&state.prompt, &classroom).await;
                state.stage = Stage::Done;
                json_event(TEACHER_FEEDBACK, &feedback)
            }
            Stage::Done => Event::default().event(DONE).data("{}"),
            Stage::Finished => return None,
        };
        Some((Ok(event), state))
    })
}
