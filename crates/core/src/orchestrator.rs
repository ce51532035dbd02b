//! Classroom Orchestrator
//!
//! Fans one teacher prompt out to every student agent at once, waits for all
//! of them, optionally voices their answers, and folds the results into one
//! [`ClassroomResponse`] in roster order.

use crate::{
    lesson::TeacherPrompt,
    student::{StudentAgent, StudentResponse},
    voice::VoiceRenderer,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Student task failed to complete: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Student task {0} produced no result")]
    MissingResult(usize),
}

/// The classroom's combined reaction to one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassroomResponse {
    /// One entry per student, in roster order.
    pub students: Vec<StudentResponse>,
    pub would_raise_hand_count: usize,
    #[schema(example = "2 out of 3 students would raise their hand to answer this question.")]
    pub summary: String,
}

impl ClassroomResponse {
    fn assemble(students: Vec<StudentResponse>, audio_count: Option<usize>) -> Self {
        let raised = students.iter().filter(|s| s.would_raise_hand).count();
        let total = students.len();
        let summary = match audio_count {
            None => format!(
                "{raised} out of {total} students would raise their hand to answer this question."
            ),
            Some(voiced) => format!(
                "{raised} out of {total} students would raise their hand. Audio generated for {voiced} responses."
            ),
        };
        Self {
            students,
            would_raise_hand_count: raised,
            summary,
        }
    }
}

/// Owns the roster of student agents.
#[derive(Clone)]
pub struct ClassroomOrchestrator {
    agents: Arc<Vec<StudentAgent>>,
    voice: Option<VoiceRenderer>,
}

impl ClassroomOrchestrator {
    pub fn new(agents: Vec<StudentAgent>, voice: Option<VoiceRenderer>) -> Self {
        Self {
            agents: Arc::new(agents),
            voice,
        }
    }

    /// Runs every student against the same prompt and collects the results.
    ///
    /// Individual student or synthesis failures never fail the dispatch; only
    /// a fault of the task runtime itself does.
    #[instrument(skip_all, fields(students = self.agents.len(), include_audio = include_audio))]
    pub async fn dispatch(
        &self,
        prompt: &TeacherPrompt,
        include_audio: bool,
    ) -> Result<ClassroomResponse, OrchestratorError> {
        let started = Instant::now();
        let prompt = Arc::new(prompt.clone());

        let mut join_set = JoinSet::new();
        for (index, agent) in self.agents.iter().enumerate() {
            let agent = agent.clone();
            let prompt = Arc::clone(&prompt);
            join_set.spawn(async move { (index, agent.respond(&prompt).await) });
        }

        let mut slots: Vec<Option<StudentResponse>> = vec![None; self.agents.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, response) = joined?;
            slots[index] = Some(response);
        }
        let mut students = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(OrchestratorError::MissingResult(index)))
            .collect::<Result<Vec<_>, _>>()?;

        let audio_count = if include_audio {
            Some(self.attach_audio(&mut students).await)
        } else {
            None
        };

        let result = ClassroomResponse::assemble(students, audio_count);
        info!(
            raised = result.would_raise_hand_count,
            total = result.students.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Classroom dispatch complete"
        );
        Ok(result)
    }

    /// Voices every non-empty answer concurrently and returns how many got audio.
    async fn attach_audio(&self, students: &mut [StudentResponse]) -> usize {
        let Some(voice) = &self.voice else {
            warn!("Audio requested but speech synthesis is not configured");
            return 0;
        };

        let renders = students
            .iter()
            .zip(self.agents.iter())
            .map(|(student, agent)| {
                let text = student.spoken_text();
                let settings = &agent.profile().voice_settings;
                async move {
                    match text {
                        Some(text) => voice.render(Some(text), settings).await,
                        None => None,
                    }
                }
            });
        let audio = join_all(renders).await;

        let mut voiced = 0;
        for (student, clip) in students.iter_mut().zip(audio) {
            if let Some(bytes) = clip {
                student.audio_base64 = Some(STANDARD.encode(bytes));
                voiced += 1;
            }
        }
        voiced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        CountingSynthesizer, STUDENT_TEMPLATE, ScriptedGeneration, StudentScript, test_profile,
    };
    use std::time::Duration;

    fn roster(fake: &Arc<ScriptedGeneration>, ids: &[&str]) -> Vec<StudentAgent> {
        ids.iter()
            .map(|id| {
                StudentAgent::new(
                    Arc::new(test_profile(id)),
                    fake.clone(),
                    Arc::from(STUDENT_TEMPLATE),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_order_is_roster_order_despite_slow_agent() {
        let slow = Duration::from_millis(150);
        let fake = Arc::new(
            ScriptedGeneration::new()
                .student("vex", StudentScript::raised("3/4").delayed(slow))
                .student("chipper", StudentScript::raised("Like pizza"))
                .student("riven", StudentScript::quiet("Um, 2/6?")),
        );
        let orchestrator =
            ClassroomOrchestrator::new(roster(&fake, &["vex", "chipper", "riven"]), None);

        for _ in 0..3 {
            let result = orchestrator
                .dispatch(&TeacherPrompt::new("What is 1/2 + 1/4?"), false)
                .await
                .unwrap();
            let ids: Vec<_> = result
                .students
                .iter()
                .map(|s| s.student_id.as_str())
                .collect();
            assert_eq!(ids, vec!["vex", "chipper", "riven"]);
        }
    }

    #[tokio::test]
    async fn test_agents_run_concurrently() {
        let delay = Duration::from_millis(200);
        let fake = Arc::new(
            ScriptedGeneration::new()
                .student("a", StudentScript::raised("a").delayed(delay))
                .student("b", StudentScript::raised("b").delayed(delay))
                .student("c", StudentScript::raised("c").delayed(delay)),
        );
        let orchestrator = ClassroomOrchestrator::new(roster(&fake, &["a", "b", "c"]), None);

        let started = Instant::now();
        orchestrator
            .dispatch(&TeacherPrompt::new("Go"), false)
            .await
            .unwrap();
        assert!(started.elapsed() < delay * 2, "dispatch ran sequentially");
    }

    #[tokio::test]
    async fn test_one_failure_is_isolated() {
        let fake = Arc::new(
            ScriptedGeneration::new()
                .student("vex", StudentScript::raised("3/4"))
                .student("chipper", StudentScript::failing())
                .student("riven", StudentScript::quiet("Maybe?")),
        );
        let orchestrator =
            ClassroomOrchestrator::new(roster(&fake, &["vex", "chipper", "riven"]), None);

        let result = orchestrator
            .dispatch(&TeacherPrompt::new("Why?"), false)
            .await
            .unwrap();

        assert_eq!(result.students.len(), 3);
        assert!(result.students[0].would_raise_hand);
        assert_eq!(result.students[0].response.as_deref(), Some("3/4"));

        let degraded = &result.students[1];
        assert!(!degraded.would_raise_hand);
        assert_eq!(degraded.confidence_score, 0.0);
        assert!(degraded.response.is_none());
        assert!(!degraded.thinking_process.is_empty());

        assert_eq!(result.students[2].response.as_deref(), Some("Maybe?"));
        assert_eq!(result.would_raise_hand_count, 1);
        assert_eq!(
            result.summary,
            "1 out of 3 students would raise their hand to answer this question."
        );
    }

    #[tokio::test]
    async fn test_empty_roster_yields_empty_result() {
        let orchestrator = ClassroomOrchestrator::new(Vec::new(), None);
        let result = orchestrator
            .dispatch(&TeacherPrompt::new(""), true)
            .await
            .unwrap();

        assert!(result.students.is_empty());
        assert_eq!(result.would_raise_hand_count, 0);
        assert!(result.summary.starts_with("0 out of 0 students"));
    }

    #[tokio::test]
    async fn test_audio_skips_students_without_utterance() {
        let fake = Arc::new(
            ScriptedGeneration::new()
                .student("vex", StudentScript::raised("3/4"))
                .student("chipper", StudentScript::failing())
                .student("riven", StudentScript::quiet("Um")),
        );
        let synth = Arc::new(CountingSynthesizer::default());
        let orchestrator = ClassroomOrchestrator::new(
            roster(&fake, &["vex", "chipper", "riven"]),
            Some(VoiceRenderer::new(synth.clone())),
        );

        let result = orchestrator
            .dispatch(&TeacherPrompt::new("Why?"), true)
            .await
            .unwrap();

        assert_eq!(synth.calls(), 2);
        assert_eq!(synth.texts(), vec!["3/4".to_string(), "Um".to_string()]);
        assert!(result.students[0].audio_base64.is_some());
        assert!(result.students[1].audio_base64.is_none());
        assert!(result.students[2].audio_base64.is_some());
        assert_eq!(
            result.summary,
            "1 out of 3 students would raise their hand. Audio generated for 2 responses."
        );
    }

    #[tokio::test]
    async fn test_audio_failure_leaves_field_empty() {
        let script = StudentScript::raised("3/4");
        let fake = Arc::new(ScriptedGeneration::new().student("vex", script));
        let synth = Arc::new(CountingSynthesizer::failing());
        let orchestrator = ClassroomOrchestrator::new(
            roster(&fake, &["vex"]),
            Some(VoiceRenderer::new(synth.clone())),
        );

        let result = orchestrator
            .dispatch(&TeacherPrompt::new("Why?"), true)
            .await
            .unwrap();
        assert_eq!(synth.calls(), 1);
        assert!(result.students[0].audio_base64.is_none());
        assert!(result.summary.ends_with("Audio generated for 0 responses."));
    }

    #[tokio::test]
    async fn test_text_mode_never_synthesizes() {
        let script = StudentScript::raised("3/4");
        let fake = Arc::new(ScriptedGeneration::new().student("vex", script));
        let synth = Arc::new(CountingSynthesizer::default());
        let orchestrator = ClassroomOrchestrator::new(
            roster(&fake, &["vex"]),
            Some(VoiceRenderer::new(synth.clone())),
        );

        let result = orchestrator
            .dispatch(&TeacherPrompt::new("Why?"), false)
            .await
            .unwrap();
        assert_eq!(synth.calls(), 0);
        assert!(result.students[0].audio_base64.is_none());
    }

    #[test]
    fn test_count_matches_raised_flags() {
        let make = |raised: bool| StudentResponse {
            student_id: "s".into(),
            student_name: "S".into(),
            would_raise_hand: raised,
            confidence_score: 0.5,
            thinking_process: String::new(),
            response: None,
            audio_base64: None,
        };
        for n in 0..5 {
            let students: Vec<_> = (0..n).map(|i| make(i % 2 == 0)).collect();
            let expected = students.iter().filter(|s| s.would_raise_hand).count();
            let result = ClassroomResponse::assemble(students, None);
            assert_eq!(result.would_raise_hand_count, expected);
        }
    }
}
