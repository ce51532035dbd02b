//! Scripted fakes for the generation and synthesis capabilities.
//!
//! Unlike the `mockall` mocks, these can sleep per student and keep a shared
//! log of calls, which is what ordering and concurrency tests need.

use crate::{
    llm_client::{GenerationClient, GenerationError, GenerationRequest, StructuredOutput},
    profile::{HandRaisingCriteria, StudentProfile, StudentTraits, VoiceSettings},
    student::StudentDecision,
    voice::{SpeechSynthesizer, SynthesisError},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A student template that tags each system prompt with the student's id.
pub const STUDENT_TEMPLATE: &str =
    "[student:{id}] You are {name}, a student in {grade_level}.\n{lesson_context}\n{conversation_history}";

/// Builds a valid profile for tests.
pub fn test_profile(id: &str) -> StudentProfile {
    let mut name = id.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    StudentProfile {
        id: id.to_string(),
        name,
        learning_style: "algorithmic".to_string(),
        description: format!("Test student {id}."),
        traits: StudentTraits {
            confidence_level: 0.5,
            participation_willingness: 0.5,
            processing_speed: "steady".to_string(),
        },
        strengths: vec!["Following steps".to_string()],
        challenges: vec!["Open questions".to_string()],
        hand_raising_criteria: HandRaisingCriteria {
            requires_clear_procedure: true,
            comfort_with_ambiguity: 0.5,
            prefers_structured_questions: true,
            needs_high_confidence: None,
            can_visualize_problem: None,
            recognizes_familiar_pattern: None,
        },
        response_patterns: vec!["Answers briefly".to_string()],
        thinking_approach: "Looks for a rule.".to_string(),
        voice_settings: VoiceSettings {
            language_code: "en-US".to_string(),
            voice_name: format!("voice-{id}"),
            pitch: 0.0,
            speaking_rate: 1.0,
        },
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Output(Value),
    Transport,
    Malformed,
}

impl Reply {
    fn into_result(self, schema: &str) -> Result<Value, GenerationError> {
        match self {
            Reply::Output(value) => Ok(value),
            Reply::Transport => Err(GenerationError::Request("scripted failure".to_string())),
            Reply::Malformed => Err(GenerationError::Malformed {
                schema: schema.to_string(),
                reason: "scripted malformed output".to_string(),
            }),
        }
    }
}

/// What one scripted student answers, and how long it takes.
#[derive(Debug, Clone)]
pub struct StudentScript {
    reply: Reply,
    delay: Duration,
}

impl StudentScript {
    fn decision(raised: bool, confidence: f64, utterance: &str) -> Self {
        Self {
            reply: Reply::Output(json!({
                "would_raise_hand": raised,
                "confidence_score": confidence,
                "thinking_process": format!("Thinking about: {utterance}"),
                "response": utterance,
            })),
            delay: Duration::ZERO,
        }
    }

    pub fn raised(utterance: &str) -> Self {
        Self::decision(true, 0.9, utterance)
    }

    pub fn quiet(utterance: &str) -> Self {
        Self::decision(false, 0.3, utterance)
    }

    pub fn failing() -> Self {
        Self {
            reply: Reply::Transport,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A [`GenerationClient`] that answers from a script.
///
/// Student calls are routed by the `[student:<id>]` tag of
/// [`STUDENT_TEMPLATE`]; every other call is routed by schema name. Each call
/// appends `call:<schema>` to the shared log when it is issued.
#[derive(Default)]
pub struct ScriptedGeneration {
    students: HashMap<String, StudentScript>,
    outputs: HashMap<&'static str, (Reply, Duration)>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn student(mut self, id: &str, script: StudentScript) -> Self {
        self.students.insert(id.to_string(), script);
        self
    }

    /// Scripts a successful output for a schema.
    pub fn output(mut self, schema: &'static str, value: Value) -> Self {
        let reply = (Reply::Output(value), Duration::ZERO);
        self.outputs.insert(schema, reply);
        self
    }

    /// Scripts a transport failure for a schema.
    pub fn failure(mut self, schema: &'static str) -> Self {
        let reply = (Reply::Transport, Duration::ZERO);
        self.outputs.insert(schema, reply);
        self
    }

    /// Scripts output that does not match the schema.
    pub fn malformed(mut self, schema: &'static str) -> Self {
        let reply = (Reply::Malformed, Duration::ZERO);
        self.outputs.insert(schema, reply);
        self
    }

    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    /// The schema names called so far, in issue order.
    pub fn calls(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix("call:").map(str::to_string))
            .collect()
    }

    fn record(&self, schema: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("call:{schema}"));
        }
    }

    fn student_script(&self, request: &GenerationRequest) -> Option<&StudentScript> {
        let tagged = request.system_instruction.strip_prefix("[student:")?;
        let id = &tagged[..tagged.find(']')?];
        self.students.get(id)
    }
}

#[async_trait]
impl GenerationClient for ScriptedGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        self.record(request.schema_name);

        let (reply, delay) = if request.schema_name == StudentDecision::NAME {
            match self.student_script(&request) {
                Some(script) => (script.reply.clone(), script.delay),
                None => (StudentScript::quiet("I'm not sure.").reply, Duration::ZERO),
            }
        } else {
            self.outputs
                .get(request.schema_name)
                .cloned()
                .unwrap_or((Reply::Transport, Duration::ZERO))
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply.into_result(request.schema_name)
    }
}

/// A [`SpeechSynthesizer`] that counts calls and returns fixed bytes.
#[derive(Default)]
pub struct CountingSynthesizer {
    texts: Mutex<Vec<String>>,
    fail: bool,
}

impl CountingSynthesizer {
    pub fn failing() -> Self {
        Self {
            texts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.texts().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SpeechSynthesizer for CountingSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceSettings,
    ) -> Result<Vec<u8>, SynthesisError> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        if self.fail {
            return Err(SynthesisError::Decode("scripted failure".to_string()));
        }
        Ok(b"ID3scripted".to_vec())
    }
}
