//! Core of the classroom rehearsal service: student profiles, the simulated
//! students themselves, the orchestrator that runs them together, and the
//! coaching, summary and lesson-analysis agents built on the same generation
//! capability.

pub mod analyzer;
pub mod coaching;
pub mod lesson;
pub mod llm_client;
pub mod orchestrator;
pub mod profile;
pub mod prompts;
pub mod student;
pub mod style;
pub mod summary;
pub mod voice;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
