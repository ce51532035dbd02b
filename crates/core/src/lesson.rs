//! Lesson Context and Classroom Exchange Types
//!
//! These are the per-request values the rest of the crate consumes: the
//! structured context of the lesson being rehearsed, the transcript of the
//! discussion so far, and the teacher's current prompt. All of them are owned
//! by the caller and handed to components by reference for a single call.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Grade framing used when a prompt arrives without any lesson context.
pub const DEFAULT_GRADE_LEVEL: &str = "8th grade";

/// A single line of the classroom transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationMessage {
    /// Who spoke, e.g. "Teacher" or a student's name.
    #[schema(example = "Teacher")]
    pub speaker: String,
    /// What they said.
    #[schema(example = "What is 1/2 + 1/4?")]
    pub message: String,
}

impl ConversationMessage {
    pub fn new(speaker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
        }
    }
}

/// How one particular student is expected to think about the lesson's problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct StudentApproach {
    pub student_id: String,
    pub student_name: String,
    pub learning_style: String,
    /// How this student would naturally think about the problem.
    pub thinking_approach: String,
}

/// Structured context about the lesson being rehearsed.
///
/// Built once per rehearsal session by the lesson analyzer and then sent back
/// by the client with every prompt, so that student agents and the coaching
/// evaluator frame their output around the same lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LessonContext {
    #[serde(default = "default_grade_level")]
    #[schema(example = "3rd grade")]
    pub grade_level: String,
    #[serde(default = "default_subject")]
    #[schema(example = "Mathematics")]
    pub subject: String,
    #[schema(example = "Fractions")]
    pub topic: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub context_summary: String,
    /// The specific problem or scenario being discussed, when one was found.
    #[serde(default)]
    pub mathematical_problem: Option<String>,
    /// Per-student approaches, keyed by student id.
    #[serde(default)]
    pub student_approaches: HashMap<String, StudentApproach>,
}

fn default_grade_level() -> String {
    DEFAULT_GRADE_LEVEL.to_string()
}

fn default_subject() -> String {
    "Mathematics".to_string()
}

impl LessonContext {
    /// Creates a minimal context for a topic, with every other field defaulted.
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            grade_level: default_grade_level(),
            subject: default_subject(),
            topic: topic.into(),
            learning_objectives: Vec::new(),
            key_concepts: Vec::new(),
            context_summary: String::new(),
            mathematical_problem: None,
            student_approaches: HashMap::new(),
        }
    }

    /// Returns the approach generated for a given student, if any.
    pub fn approach_for(&self, student_id: &str) -> Option<&StudentApproach> {
        self.student_approaches.get(student_id)
    }

    /// The problem statement if the analyzer found one, otherwise the topic.
    pub fn problem_or_topic(&self) -> &str {
        self.mathematical_problem
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.topic)
    }
}

/// The teacher's current utterance together with its shared context.
///
/// This is the stimulus every student agent sees, identically, in a single
/// dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TeacherPrompt {
    /// What the teacher just said. Required, but may be empty.
    #[schema(example = "What is 1/2 + 1/4?")]
    pub prompt: String,
    #[serde(default)]
    pub lesson_context: Option<LessonContext>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
}

impl TeacherPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: LessonContext) -> Self {
        self.lesson_context = Some(context);
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationMessage>) -> Self {
        self.conversation_history = history;
        self
    }

    /// Grade framing for prompts: the lesson's grade, or the default.
    pub fn grade_level(&self) -> &str {
        self.lesson_context
            .as_ref()
            .map(|c| c.grade_level.as_str())
            .unwrap_or(DEFAULT_GRADE_LEVEL)
    }
}
