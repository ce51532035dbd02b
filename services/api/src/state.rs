//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the roster and the
//! agents built over it. It is created once at startup and shared read-only by
//! every handler.

use rehearsal_core::{
    analyzer::LessonAnalyzer,
    coaching::CoachingEvaluator,
    llm_client::GenerationClient,
    orchestrator::ClassroomOrchestrator,
    profile::StudentProfile,
    prompts::PromptLibrary,
    student::StudentAgent,
    summary::LessonSummarizer,
    voice::{SpeechSynthesizer, VoiceRenderer},
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<Vec<StudentProfile>>,
    pub orchestrator: ClassroomOrchestrator,
    pub coach: CoachingEvaluator,
    pub summarizer: LessonSummarizer,
    pub analyzer: LessonAnalyzer,
}

impl AppState {
    /// Wires the agents together.
    ///
    /// Students use `student_client`; coaching, summaries and lesson analysis
    /// use `coach_client`. Audio is only available when a synthesizer is given.
    pub fn new(
        profiles: Vec<StudentProfile>,
        prompts: PromptLibrary,
        student_client: Arc<dyn GenerationClient>,
        coach_client: Arc<dyn GenerationClient>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        let student_template: Arc<str> = Arc::from(prompts.student_agent);
        let agents = profiles
            .iter()
            .map(|profile| {
                StudentAgent::new(
                    Arc::new(profile.clone()),
                    Arc::clone(&student_client),
                    Arc::clone(&student_template),
                )
            })
            .collect();
        let voice = synthesizer.map(VoiceRenderer::new);

        Self {
            profiles: Arc::new(profiles),
            orchestrator: ClassroomOrchestrator::new(agents, voice),
            coach: CoachingEvaluator::new(
                Arc::clone(&coach_client),
                Arc::from(prompts.teacher_feedback),
            ),
            summarizer: LessonSummarizer::new(
                Arc::clone(&coach_client),
                Arc::from(prompts.lesson_summary),
            ),
            analyzer: LessonAnalyzer::new(coach_client, Arc::from(prompts.lesson_analysis)),
        }
    }
}
