//! Lesson-End Summarizer
//!
//! Produces the end-of-lesson report from the full transcript.
//!
//! Unlike the student agents and the coaching evaluator, this component does
//! not substitute a fallback when the model call fails or its output does not
//! match the report schema. A partial or invented end-of-lesson report is worse
//! than an explicit failure, so the error is returned to the caller.

use crate::{
    lesson::{ConversationMessage, LessonContext},
    llm_client::{
        ContentPart, GenerationClient, GenerationError, GenerationRequest, StructuredOutput,
        generate_structured,
    },
    prompts::render,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

const SUMMARY_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Failed to generate lesson summary: {0}")]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct LessonSummary {
    /// Total number of teacher-student exchanges.
    pub total_exchanges: u32,
    /// Names of the students who were called on.
    pub students_called_on: Vec<String>,
    pub participation_pattern: String,
    pub key_moments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct StrengthsAndGrowth {
    pub strengths: Vec<String>,
    pub areas_for_growth: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct NextSteps {
    pub immediate_actions: Vec<String>,
    /// One skill to focus on practicing.
    pub practice_focus: String,
    #[serde(default)]
    pub resources: Option<Vec<String>>,
}

/// The end-of-lesson report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct EndLessonResponse {
    pub lesson_summary: LessonSummary,
    /// Narrative feedback on the quality of the mathematical discussion.
    pub overall_feedback: String,
    pub strengths_and_growth: StrengthsAndGrowth,
    pub next_steps: NextSteps,
    /// A closing, encouraging message.
    pub celebration: String,
}

impl StructuredOutput for EndLessonResponse {
    const NAME: &'static str = "lesson_summary";

    fn validate(&self) -> Result<(), String> {
        if self.overall_feedback.trim().is_empty() {
            return Err("overall_feedback must not be empty".to_string());
        }
        if self.next_steps.practice_focus.trim().is_empty() {
            return Err("practice_focus must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct LessonSummarizer {
    client: Arc<dyn GenerationClient>,
    template: Arc<str>,
}

impl LessonSummarizer {
    pub fn new(client: Arc<dyn GenerationClient>, template: Arc<str>) -> Self {
        Self { client, template }
    }

    pub fn build_context(context: &LessonContext, transcript: &[ConversationMessage]) -> String {
        let objectives = context.learning_objectives.join("; ");
        let mut lines = vec![
            "LESSON CONTEXT:".to_string(),
            format!("Grade Level: {}", context.grade_level),
            format!("Subject: {}", context.subject),
            format!("Topic: {}", context.topic),
            format!("Learning Objectives: {objectives}"),
            format!("Key Concepts: {}", context.key_concepts.join(", ")),
            format!("Developmental Context: {}", context.context_summary),
        ];
        if let Some(problem) = &context.mathematical_problem {
            lines.push(format!("Problem: {problem}"));
        }
        lines.push(String::new());
        lines.push("COMPLETE LESSON TRANSCRIPT:".to_string());
        lines.extend(
            transcript
                .iter()
                .enumerate()
                .map(|(i, m)| format!("{}. {}: {}", i + 1, m.speaker, m.message)),
        );
        lines.join("\n")
    }

    /// Summarizes a finished lesson.
    #[instrument(skip_all, fields(topic = %context.topic, messages = transcript.len()))]
    pub async fn summarize(
        &self,
        context: &LessonContext,
        transcript: &[ConversationMessage],
    ) -> Result<EndLessonResponse, SummaryError> {
        let system = render(
            &self.template,
            &[
                ("grade_level", &context.grade_level),
                ("topic", &context.topic),
            ],
        );
        let request = GenerationRequest::for_output::<EndLessonResponse>(
            system,
            vec![ContentPart::Text(Self::build_context(context, transcript))],
            SUMMARY_TEMPERATURE,
        );

        let report = generate_structured::<EndLessonResponse>(self.client.as_ref(), request)
            .await
            .map_err(|e| {
                error!(error = %e, "Lesson summary failed");
                SummaryError::from(e)
            })?;
        info!(
            exchanges = report.lesson_summary.total_exchanges,
            "Lesson summary generated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockGenerationClient;
    use serde_json::json;

    fn report() -> serde_json::Value {
        json!({
            "lesson_summary": {
                "total_exchanges": 2,
                "students_called_on": ["Vex"],
                "participation_pattern": "Mostly Vex.",
                "key_moments": ["Vex found a common denominator."]
            },
            "overall_feedback": "You pressed for reasoning.",
            "strengths_and_growth": {
                "strengths": ["Asked why"],
                "areas_for_growth": ["Include Riven"]
            },
            "next_steps": {
                "immediate_actions": ["Call on a quiet student"],
                "practice_focus": "Revoicing"
            },
            "celebration": "Great start!"
        })
    }

    fn transcript() -> Vec<ConversationMessage> {
        vec![
            ConversationMessage::new("Teacher", "What is 1/2 + 1/4?"),
            ConversationMessage::new("Vex", "3/4"),
        ]
    }

    fn summarizer(mock: MockGenerationClient) -> LessonSummarizer {
        LessonSummarizer::new(Arc::new(mock), Arc::from("Summarize a {topic} lesson."))
    }

    #[tokio::test]
    async fn test_summarize_returns_report() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .withf(|req| {
                req.system_instruction == "Summarize a Fractions lesson."
                    && req.schema_name == "lesson_summary"
            })
            .times(1)
            .returning(|_| Ok(report()));

        let summary = summarizer(mock)
            .summarize(&LessonContext::for_topic("Fractions"), &transcript())
            .await
            .unwrap();

        assert_eq!(summary.lesson_summary.total_exchanges, 2);
        assert_eq!(summary.next_steps.practice_focus, "Revoicing");
        assert!(summary.next_steps.resources.is_none());
    }

    #[tokio::test]
    async fn test_malformed_output_is_an_error() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .returning(|_| Ok(json!({ "overall_feedback": "partial" })));

        let result = summarizer(mock)
            .summarize(&LessonContext::for_topic("Fractions"), &transcript())
            .await;

        match result {
            Err(SummaryError::Generation(e)) => assert!(e.is_malformed()),
            other => panic!("Expected a generation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .returning(|_| Err(GenerationError::Request("unavailable".to_string())));

        let result = summarizer(mock)
            .summarize(&LessonContext::for_topic("Fractions"), &[])
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_context_numbers_transcript_lines() {
        let mut context = LessonContext::for_topic("Fractions");
        context.mathematical_problem = Some("Share 3 pizzas among 4 friends".to_string());
        let text = LessonSummarizer::build_context(&context, &transcript());

        assert!(text.contains("Topic: Fractions"));
        assert!(text.contains("Problem: Share 3 pizzas among 4 friends"));
        assert!(text.contains("1. Teacher: What is 1/2 + 1/4?\n2. Vex: 3/4"));
    }
}
