//! Student Agent
//!
//! One simulated student. Given the teacher's prompt, the agent asks the model
//! whether this particular student would raise their hand, how confident they
//! feel, what they are thinking, and what they would say if called on.
//!
//! A failed generation call never escapes this module: the agent returns a
//! degraded [`StudentResponse`] instead, so one broken call cannot spoil a
//! classroom-wide dispatch.

use crate::{
    lesson::TeacherPrompt,
    llm_client::{
        ContentPart, GenerationClient, GenerationError, GenerationRequest, StructuredOutput,
        generate_structured,
    },
    profile::StudentProfile,
    prompts::{bullet_list, render},
    style::guidance_for,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;

const STUDENT_TEMPERATURE: f32 = 0.7;

/// The four fields a student agent asks the model for.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StudentDecision {
    /// Would you raise your hand to answer this question?
    pub would_raise_hand: bool,
    /// How confident you feel about your answer, from 0.0 to 1.0.
    pub confidence_score: f64,
    /// Your internal reasoning.
    #[serde(default)]
    pub thinking_process: Option<String>,
    /// What you would say if called on, even if you would not volunteer.
    #[serde(default)]
    pub response: Option<String>,
}

impl StructuredOutput for StudentDecision {
    const NAME: &'static str = "student_decision";

    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence_score must be within [0, 1], got {}",
                self.confidence_score
            ));
        }
        Ok(())
    }
}

/// One student's reaction to a teacher prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[schema(example = "vex")]
    pub student_id: String,
    #[schema(example = "Vex")]
    pub student_name: String,
    pub would_raise_hand: bool,
    /// In `[0, 1]`.
    pub confidence_score: f64,
    /// The student's internal reasoning. Never null.
    pub thinking_process: String,
    /// What the student would say if called on. Null only after a failed call.
    pub response: Option<String>,
    /// Base64-encoded MP3 of `response`, when audio was requested and produced.
    #[serde(default)]
    pub audio_base64: Option<String>,
}

impl StudentResponse {
    fn from_decision(profile: &StudentProfile, decision: StudentDecision) -> Self {
        Self {
            student_id: profile.id.clone(),
            student_name: profile.name.clone(),
            would_raise_hand: decision.would_raise_hand,
            confidence_score: decision.confidence_score,
            thinking_process: decision.thinking_process.unwrap_or_default(),
            response: decision.response,
            audio_base64: None,
        }
    }

    /// The placeholder returned when the generation call fails.
    pub fn degraded(profile: &StudentProfile, error: &GenerationError) -> Self {
        Self {
            student_id: profile.id.clone(),
            student_name: profile.name.clone(),
            would_raise_hand: false,
            confidence_score: 0.0,
            thinking_process: format!("Error occurred: {error}"),
            response: None,
            audio_base64: None,
        }
    }

    /// The utterance, if there is one worth voicing.
    pub fn spoken_text(&self) -> Option<&str> {
        self.response.as_deref().filter(|r| !r.trim().is_empty())
    }
}

/// A single student agent: an immutable profile plus a handle to the model.
#[derive(Clone)]
pub struct StudentAgent {
    profile: Arc<StudentProfile>,
    client: Arc<dyn GenerationClient>,
    template: Arc<str>,
}

impl StudentAgent {
    pub fn new(
        profile: Arc<StudentProfile>,
        client: Arc<dyn GenerationClient>,
        template: Arc<str>,
    ) -> Self {
        Self {
            profile,
            client,
            template,
        }
    }

    pub fn profile(&self) -> &StudentProfile {
        &self.profile
    }

    /// Builds the system instruction for this student and this prompt.
    ///
    /// The output depends only on this agent's profile and the shared prompt,
    /// never on any other agent.
    pub fn build_system_prompt(&self, prompt: &TeacherPrompt) -> String {
        let profile = &*self.profile;
        let grade_level = prompt.grade_level();

        let lesson_section = match &prompt.lesson_context {
            Some(context) => {
                let approach = match context.approach_for(&profile.id) {
                    Some(approach) => format!(
                        "HOW YOU ({}) THINK ABOUT THIS SPECIFIC PROBLEM:\n{}",
                        profile.name, approach.thinking_approach
                    ),
                    None => format!(
                        "GUIDANCE FOR {} ({}):\n{}",
                        profile.name,
                        profile.learning_style,
                        guidance_for(&profile.learning_style, &context.topic)
                    ),
                };
                format!(
                    "LESSON CONTEXT:\nGrade Level: {}\nSubject: {}\nTopic: {}\n\nLearning Objectives:\n{}\n\nKey Concepts:\n{}\n\nContext: {}\n\n{}",
                    context.grade_level,
                    context.subject,
                    context.topic,
                    bullet_list(&context.learning_objectives),
                    bullet_list(&context.key_concepts),
                    context.context_summary,
                    approach
                )
            }
            None => format!(
                "No lesson context was provided. Respond as a typical {grade_level} math student would."
            ),
        };

        let history_section = if prompt.conversation_history.is_empty() {
            "(This is the start of the discussion.)".to_string()
        } else {
            prompt
                .conversation_history
                .iter()
                .map(|m| format!("{}: {}", m.speaker, m.message))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let confidence = format!("{:.1}", profile.traits.confidence_level);
        let willingness = format!("{:.1}", profile.traits.participation_willingness);
        let rubric = bullet_list(&profile.hand_raising_criteria.describe());
        let strengths = bullet_list(&profile.strengths);
        let challenges = bullet_list(&profile.challenges);
        let patterns = bullet_list(&profile.response_patterns);

        render(
            &self.template,
            &[
                ("id", &profile.id),
                ("name", &profile.name),
                ("grade_level", grade_level),
                ("learning_style", &profile.learning_style),
                ("description", &profile.description),
                ("strengths", &strengths),
                ("challenges", &challenges),
                ("thinking_approach", &profile.thinking_approach),
                ("confidence_level", &confidence),
                ("participation_willingness", &willingness),
                ("processing_speed", &profile.traits.processing_speed),
                ("hand_raising_criteria", &rubric),
                ("response_patterns", &patterns),
                ("lesson_context", &lesson_section),
                ("conversation_history", &history_section),
            ],
        )
    }

    /// Produces this student's reaction to the prompt.
    ///
    /// Never fails: any generation error becomes a degraded response with the
    /// error embedded in `thinking_process`.
    pub async fn respond(&self, prompt: &TeacherPrompt) -> StudentResponse {
        let request = GenerationRequest::for_output::<StudentDecision>(
            self.build_system_prompt(prompt),
            vec![ContentPart::Text(prompt.prompt.clone())],
            STUDENT_TEMPERATURE,
        );

        match generate_structured::<StudentDecision>(self.client.as_ref(), request).await {
            Ok(decision) => {
                debug!(
                    student = %self.profile.id,
                    raised = decision.would_raise_hand,
                    confidence = decision.confidence_score,
                    "Student decided"
                );
                StudentResponse::from_decision(&self.profile, decision)
            }
            Err(e) => {
                warn!(student = %self.profile.id, error = %e, "Student agent failed, returning degraded response");
                StudentResponse::degraded(&self.profile, &e)
            }
        }
    }
}
