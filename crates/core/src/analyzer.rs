//! Lesson Analyzer
//!
//! Reads a lesson plan (text, PDF, or both) once per rehearsal session and
//! derives the [`LessonContext`] that every later prompt carries, including
//! how each student on the roster is likely to think about the problem.

use crate::{
    lesson::{LessonContext, StudentApproach},
    llm_client::{
        ContentPart, GenerationClient, GenerationError, GenerationRequest, StructuredOutput,
        generate_structured,
    },
    profile::StudentProfile,
    prompts::render,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

const ANALYSIS_TEMPERATURE: f32 = 0.3;
pub const FALLBACK_TOPIC: &str = "General Discussion";

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Must provide either lesson_plan_text or lesson_plan_pdf_base64")]
    EmptyLessonPlan,
    #[error("lesson_plan_pdf_base64 is not valid base64: {0}")]
    InvalidPdf(String),
    #[error("Lesson analysis failed: {0}")]
    Generation(#[from] GenerationError),
}

/// The lesson plan to analyze.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LessonSetupRequest {
    #[serde(default)]
    pub lesson_plan_text: String,
    /// Optional base64-encoded PDF of the lesson plan.
    #[serde(default)]
    pub lesson_plan_pdf_base64: Option<String>,
}

impl LessonSetupRequest {
    /// Checks the request and turns it into content parts.
    pub fn to_parts(&self) -> Result<Vec<ContentPart>, AnalyzerError> {
        let mut parts = Vec::new();
        if !self.lesson_plan_text.trim().is_empty() {
            parts.push(ContentPart::Text(format!("Lesson Plan:\n\n{}", self.lesson_plan_text)));
        }
        if let Some(pdf) = self
            .lesson_plan_pdf_base64
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            STANDARD
                .decode(pdf)
                .map_err(|e| AnalyzerError::InvalidPdf(e.to_string()))?;
            parts.push(ContentPart::InlineData {
                mime_type: "application/pdf".to_string(),
                data_base64: pdf.to_string(),
            });
        }
        if parts.is_empty() {
            return Err(AnalyzerError::EmptyLessonPlan);
        }
        Ok(parts)
    }
}

/// What the model returns for a lesson plan.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LessonAnalysis {
    pub grade_level: String,
    pub subject: String,
    pub topic: String,
    pub learning_objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    /// How students at this grade typically approach the topic.
    pub context_summary: String,
    /// The specific problem or scenario the lesson discusses, if any.
    #[serde(default)]
    pub mathematical_problem: Option<String>,
    /// One entry per student profile.
    #[serde(default)]
    pub student_approaches: Vec<StudentApproach>,
}

impl StructuredOutput for LessonAnalysis {
    const NAME: &'static str = "lesson_analysis";

    fn validate(&self) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("topic must not be empty".to_string());
        }
        Ok(())
    }
}

impl LessonAnalysis {
    /// Keeps only approaches for students on the roster, keyed by id.
    fn into_context(self, roster: &[StudentProfile]) -> LessonContext {
        let mut approaches = HashMap::new();
        for approach in self.student_approaches {
            if roster.iter().any(|p| p.id == approach.student_id) {
                approaches.insert(approach.student_id.clone(), approach);
            } else {
                debug!(student = %approach.student_id, "Dropping approach for unknown student");
            }
        }
        LessonContext {
            grade_level: self.grade_level,
            subject: self.subject,
            topic: self.topic,
            learning_objectives: self.learning_objectives,
            key_concepts: self.key_concepts,
            context_summary: self.context_summary,
            mathematical_problem: self.mathematical_problem,
            student_approaches: approaches,
        }
    }
}

/// The context used when the model's answer cannot be understood.
pub fn fallback_context(reason: &str) -> LessonContext {
    LessonContext {
        grade_level: "Unknown".to_string(),
        subject: "Mathematics".to_string(),
        topic: FALLBACK_TOPIC.to_string(),
        learning_objectives: vec!["Practice mathematical reasoning".to_string()],
        key_concepts: vec!["Problem solving".to_string()],
        context_summary: format!("Lesson context could not be fully extracted: {reason}"),
        mathematical_problem: None,
        student_approaches: HashMap::new(),
    }
}

#[derive(Clone)]
pub struct LessonAnalyzer {
    client: Arc<dyn GenerationClient>,
    template: Arc<str>,
}

impl LessonAnalyzer {
    pub fn new(client: Arc<dyn GenerationClient>, template: Arc<str>) -> Self {
        Self { client, template }
    }

    fn format_profiles(roster: &[StudentProfile]) -> String {
        roster
            .iter()
            .map(|p| {
                [
                    format!("STUDENT PROFILE: {}", p.name),
                    format!("- ID: {}", p.id),
                    format!("- Learning Style: {}", p.learning_style),
                    format!("- Description: {}", p.description),
                    format!("- Thinking Approach: {}", p.thinking_approach),
                    format!("- Strengths: {}", p.strengths.join(", ")),
                    format!("- Challenges: {}", p.challenges.join(", ")),
                ]
                .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Analyzes a lesson plan for the given roster.
    ///
    /// Empty or undecodable input is rejected before any call. An answer of
    /// the wrong shape yields [`fallback_context`]; a failed call is an error.
    #[instrument(skip_all, fields(students = roster.len()))]
    pub async fn analyze(
        &self,
        request: &LessonSetupRequest,
        roster: &[StudentProfile],
    ) -> Result<LessonContext, AnalyzerError> {
        let parts = request.to_parts()?;
        let system = render(
            &self.template,
            &[("student_profiles", &Self::format_profiles(roster))],
        );
        let generation =
            GenerationRequest::for_output::<LessonAnalysis>(system, parts, ANALYSIS_TEMPERATURE);

        match generate_structured::<LessonAnalysis>(self.client.as_ref(), generation).await {
            Ok(analysis) => {
                let context = analysis.into_context(roster);
                info!(
                    topic = %context.topic,
                    approaches = context.student_approaches.len(),
                    "Lesson plan analyzed"
                );
                Ok(context)
            }
            Err(e) if e.is_malformed() => {
                warn!(error = %e, "Lesson analysis was unreadable, using fallback context");
                Ok(fallback_context(&e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockGenerationClient;
    use crate::testing::test_profile;
    use serde_json::json;

    fn roster() -> Vec<StudentProfile> {
        vec![test_profile("vex"), test_profile("riven")]
    }

    fn analyzer(mock: MockGenerationClient) -> LessonAnalyzer {
        LessonAnalyzer::new(Arc::new(mock), Arc::from("Analyze.\n{student_profiles}"))
    }

    fn text_request(text: &str) -> LessonSetupRequest {
        LessonSetupRequest {
            lesson_plan_text: text.to_string(),
            lesson_plan_pdf_base64: None,
        }
    }

    #[tokio::test]
    async fn test_analyze_builds_context_with_known_approaches() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .withf(|req| {
                req.schema_name == "lesson_analysis"
                    && req.system_instruction.contains("- ID: riven")
                    && req.parts.len() == 1
            })
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "grade_level": "3rd grade",
                    "subject": "Mathematics",
                    "topic": "Fractions",
                    "learning_objectives": ["Add unit fractions"],
                    "key_concepts": ["denominator"],
                    "context_summary": "Students think in pieces.",
                    "mathematical_problem": "1/2 + 1/4",
                    "student_approaches": [
                        {
                            "student_id": "vex",
                            "student_name": "Vex",
                            "learning_style": "algorithmic",
                            "thinking_approach": "Common denominator."
                        },
                        {
                            "student_id": "ghost",
                            "student_name": "Ghost",
                            "learning_style": "visual",
                            "thinking_approach": "?"
                        }
                    ]
                }))
            });

        let context = analyzer(mock)
            .analyze(&text_request("We add fractions."), &roster())
            .await
            .unwrap();

        assert_eq!(context.grade_level, "3rd grade");
        assert_eq!(context.mathematical_problem.as_deref(), Some("1/2 + 1/4"));
        assert!(context.approach_for("vex").is_some());
        assert!(context.approach_for("ghost").is_none());
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_calling() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate().times(0);

        let result = analyzer(mock)
            .analyze(&text_request("   "), &roster())
            .await;
        assert!(matches!(result, Err(AnalyzerError::EmptyLessonPlan)));
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_rejected() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate().times(0);
        let request = LessonSetupRequest {
            lesson_plan_text: String::new(),
            lesson_plan_pdf_base64: Some("not base64!!".to_string()),
        };

        let result = analyzer(mock).analyze(&request, &roster()).await;
        assert!(matches!(result, Err(AnalyzerError::InvalidPdf(_))));
    }

    #[tokio::test]
    async fn test_malformed_output_uses_fallback() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate().returning(|_| {
            Err(GenerationError::Malformed {
                schema: "lesson_analysis".to_string(),
                reason: "expected value".to_string(),
            })
        });

        let context = analyzer(mock)
            .analyze(&text_request("Plan"), &roster())
            .await
            .unwrap();
        assert_eq!(context.topic, FALLBACK_TOPIC);
        assert_eq!(context.grade_level, "Unknown");
        assert!(context.context_summary.contains("expected value"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .returning(|_| Err(GenerationError::Request("unavailable".to_string())));

        let result = analyzer(mock)
            .analyze(&text_request("Plan"), &roster())
            .await;
        assert!(matches!(result, Err(AnalyzerError::Generation(_))));
    }

    #[test]
    fn test_pdf_and_text_both_become_parts() {
        let request = LessonSetupRequest {
            lesson_plan_text: "Plan".to_string(),
            lesson_plan_pdf_base64: Some("JVBERi0xLjQ=".to_string()),
        };
        let parts = request.to_parts().unwrap();
        assert_eq!(parts.len(), 2);
        match &parts[1] {
            ContentPart::InlineData { mime_type, .. } => assert_eq!(mime_type, "application/pdf"),
            other => panic!("Expected inline data, got {:?}", other),
        }
    }
}
