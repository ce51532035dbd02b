//! Coaching Evaluator
//!
//! Looks at what the teacher just said and how the class reacted, and returns
//! a short coaching note: which kind of discourse move the prompt was (if
//! any), feedback on it, and one thing to try next.

use crate::{
    lesson::TeacherPrompt,
    llm_client::{
        ContentPart, GenerationClient, GenerationRequest, StructuredOutput, generate_structured,
    },
    orchestrator::ClassroomResponse,
    prompts::{bullet_list, render},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;

const COACH_TEMPERATURE: f32 = 0.4;
/// Number of trailing transcript lines the coach sees.
pub const HISTORY_WINDOW: usize = 6;
/// Reasoning excerpt length used for students who gave no utterance.
pub const REASONING_EXCERPT_CHARS: usize = 160;

pub const FALLBACK_FEEDBACK: &str =
    "Coaching feedback isn't available for this prompt. Keep the discussion going and listen closely to how students respond.";
pub const FALLBACK_SUGGESTION: &str =
    "Try inviting a student to explain their reasoning, then ask the class to respond to that idea.";

/// The discourse move a teacher prompt demonstrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Extends a student's current thinking.
    BuildOn,
    /// Asks students to explain, justify or connect.
    Probing,
    /// Makes the mathematics visible for the class to examine.
    Visibility,
}

/// A coaching note on the teacher's most recent prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct TeacherFeedback {
    /// The move demonstrated, or null when none applies.
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    /// Second-person feedback on what the teacher just said.
    pub feedback: String,
    /// One concrete thing to consider next.
    pub suggestion: String,
}

impl StructuredOutput for TeacherFeedback {
    const NAME: &'static str = "teacher_feedback";

    fn validate(&self) -> Result<(), String> {
        if self.feedback.trim().is_empty() {
            return Err("feedback must not be empty".to_string());
        }
        if self.suggestion.trim().is_empty() {
            return Err("suggestion must not be empty".to_string());
        }
        Ok(())
    }
}

impl TeacherFeedback {
    /// The note returned whenever the coaching call fails.
    pub fn fallback() -> Self {
        Self {
            question_type: None,
            feedback: FALLBACK_FEEDBACK.to_string(),
            suggestion: FALLBACK_SUGGESTION.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct CoachingEvaluator {
    client: Arc<dyn GenerationClient>,
    template: Arc<str>,
}

impl CoachingEvaluator {
    pub fn new(client: Arc<dyn GenerationClient>, template: Arc<str>) -> Self {
        Self { client, template }
    }

    /// Builds the user-side content: lesson framing, recent history, the
    /// prompt, and a compact view of each student's reaction.
    pub fn build_context(&self, prompt: &TeacherPrompt, classroom: &ClassroomResponse) -> String {
        let mut lines = Vec::new();

        if let Some(context) = &prompt.lesson_context {
            lines.push("LESSON CONTEXT:".to_string());
            lines.push(format!("Grade Level: {}", context.grade_level));
            lines.push(format!("Topic: {}", context.topic));
            lines.push(format!("Problem: {}", context.problem_or_topic()));
            lines.push("Learning Objectives:".to_string());
            lines.push(bullet_list(&context.learning_objectives));
            lines.push(String::new());
        }

        let history = &prompt.conversation_history;
        if !history.is_empty() {
            lines.push("RECENT CONVERSATION:".to_string());
            let start = history.len().saturating_sub(HISTORY_WINDOW);
            for message in &history[start..] {
                lines.push(format!("{}: {}", message.speaker, message.message));
            }
            lines.push(String::new());
        }

        lines.push(format!("TEACHER JUST SAID: {}", prompt.prompt));
        lines.push(String::new());
        lines.push("STUDENT RESPONSES:".to_string());
        for student in &classroom.students {
            let hand = if student.would_raise_hand {
                "raised hand"
            } else {
                "did not raise hand"
            };
            let said = match student.spoken_text() {
                Some(text) => text.to_string(),
                None => format!("(thinking) {}", excerpt(&student.thinking_process)),
            };
            lines.push(format!("- {} ({hand}): {said}", student.student_name));
        }

        lines.join("\n")
    }

    /// Evaluates the prompt. Always returns a note; failures yield
    /// [`TeacherFeedback::fallback`].
    pub async fn evaluate(
        &self,
        prompt: &TeacherPrompt,
        classroom: &ClassroomResponse,
    ) -> TeacherFeedback {
        let system = render(&self.template, &[("grade_level", prompt.grade_level())]);
        let request = GenerationRequest::for_output::<TeacherFeedback>(
            system,
            vec![ContentPart::Text(self.build_context(prompt, classroom))],
            COACH_TEMPERATURE,
        );

        match generate_structured::<TeacherFeedback>(self.client.as_ref(), request).await {
            Ok(feedback) => {
                debug!(question_type = ?feedback.question_type, "Coaching feedback generated");
                feedback
            }
            Err(e) => {
                warn!(error = %e, "Coaching call failed, returning fallback feedback");
                TeacherFeedback::fallback()
            }
        }
    }
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(REASONING_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::{ConversationMessage, LessonContext};
    use crate::llm_client::{GenerationError, MockGenerationClient};
    use crate::student::StudentResponse;
    use serde_json::json;

    fn student(
        name: &str,
        raised: bool,
        response: Option<&str>,
        thinking: &str,
    ) -> StudentResponse {
        StudentResponse {
            student_id: name.to_lowercase(),
            student_name: name.to_string(),
            would_raise_hand: raised,
            confidence_score: 0.5,
            thinking_process: thinking.to_string(),
            response: response.map(str::to_string),
            audio_base64: None,
        }
    }

    fn classroom() -> ClassroomResponse {
        ClassroomResponse {
            students: vec![
                student("Vex", true, Some("It's 3/4."), "Common denominators."),
                student("Riven", false, None, &"x".repeat(300)),
            ],
            would_raise_hand_count: 1,
            summary: String::new(),
        }
    }

    fn evaluator(mock: MockGenerationClient) -> CoachingEvaluator {
        CoachingEvaluator::new(
            Arc::new(mock),
            Arc::from("Coach a teacher of {grade_level}."),
        )
    }

    #[tokio::test]
    async fn test_evaluate_returns_structured_feedback() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .withf(|req| {
                req.schema_name == "teacher_feedback"
                    && req.system_instruction == "Coach a teacher of 8th grade."
                    && req.temperature == COACH_TEMPERATURE
            })
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "question_type": "probing",
                    "feedback": "You asked Vex to explain.",
                    "suggestion": "Ask Riven what they notice."
                }))
            });

        let feedback = evaluator(mock)
            .evaluate(&TeacherPrompt::new("Why does that work?"), &classroom())
            .await;

        assert_eq!(feedback.question_type, Some(QuestionType::Probing));
        assert_eq!(feedback.feedback, "You asked Vex to explain.");
    }

    #[tokio::test]
    async fn test_null_question_type_is_accepted() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate().returning(|_| {
            Ok(json!({ "question_type": null, "feedback": "Okay.", "suggestion": "Ask why." }))
        });

        let feedback = evaluator(mock)
            .evaluate(&TeacherPrompt::new("Hi"), &classroom())
            .await;
        assert!(feedback.question_type.is_none());
    }

    #[tokio::test]
    async fn test_failure_returns_fallback() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .returning(|_| Err(GenerationError::Request("503".to_string())));

        let feedback = evaluator(mock)
            .evaluate(&TeacherPrompt::new("Hi"), &classroom())
            .await;
        assert_eq!(feedback, TeacherFeedback::fallback());
    }

    #[tokio::test]
    async fn test_empty_feedback_is_rejected_to_fallback() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate().returning(|_| {
            Ok(json!({ "question_type": "build_on", "feedback": " ", "suggestion": "x" }))
        });

        let feedback = evaluator(mock)
            .evaluate(&TeacherPrompt::new("Hi"), &classroom())
            .await;
        assert_eq!(feedback, TeacherFeedback::fallback());
    }

    #[test]
    fn test_question_type_wire_names() {
        assert_eq!(
            serde_json::to_value(QuestionType::BuildOn).unwrap(),
            "build_on"
        );
        assert_eq!(
            serde_json::to_value(QuestionType::Visibility).unwrap(),
            "visibility"
        );
    }

    #[test]
    fn test_context_windows_history_and_excerpts_reasoning() {
        let history: Vec<_> = (1..=8)
            .map(|i| ConversationMessage::new("Teacher", format!("line {i}")))
            .collect();
        let prompt = TeacherPrompt::new("Who agrees?")
            .with_context(LessonContext::for_topic("Fractions"))
            .with_history(history);

        let context = evaluator(MockGenerationClient::new()).build_context(&prompt, &classroom());

        assert!(!context.contains("line 2"));
        assert!(context.contains("line 3"));
        assert!(context.contains("line 8"));
        assert!(context.contains("Topic: Fractions"));
        assert!(context.contains("TEACHER JUST SAID: Who agrees?"));
        assert!(context.contains("- Vex (raised hand): It's 3/4."));
        assert!(!context.contains("Common denominators."));

        let riven = context.lines().find(|l| l.starts_with("- Riven")).unwrap();
        let truncated = format!("{}...", "x".repeat(REASONING_EXCERPT_CHARS));
        assert!(riven.ends_with(&truncated));
    }
}
