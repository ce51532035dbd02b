//! Student Profiles
//!
//! A profile describes one simulated student: who they are, how willing they
//! are to participate, how they think, and how they sound. Profiles are read
//! from YAML once at startup and shared read-only across every request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profile directory {0}: {1}")]
    Directory(PathBuf, #[source] std::io::Error),
    #[error("Failed to read profile {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse profile {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),
    #[error("Invalid profile '{0}': {1}")]
    Invalid(String, String),
}

/// Behavioral dials, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentTraits {
    pub confidence_level: f64,
    pub participation_willingness: f64,
    /// Free-form pace, e.g. "fast" or "needs extra time".
    pub processing_speed: String,
}

/// The rubric a student applies when deciding whether to raise their hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandRaisingCriteria {
    pub requires_clear_procedure: bool,
    pub comfort_with_ambiguity: f64,
    pub prefers_structured_questions: bool,
    #[serde(default)]
    pub needs_high_confidence: Option<bool>,
    #[serde(default)]
    pub can_visualize_problem: Option<bool>,
    #[serde(default)]
    pub recognizes_familiar_pattern: Option<bool>,
}

impl HandRaisingCriteria {
    /// Renders the rubric as bullet lines for a prompt.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Needs a clear procedure before volunteering: {}",
                yes_no(self.requires_clear_procedure)
            ),
            format!(
                "Comfort with open-ended or ambiguous questions: {:.1}/1.0",
                self.comfort_with_ambiguity
            ),
            format!(
                "Prefers structured questions: {}",
                yes_no(self.prefers_structured_questions)
            ),
        ];
        if let Some(v) = self.needs_high_confidence {
            lines.push(format!("Only volunteers when very confident: {}", yes_no(v)));
        }
        if let Some(v) = self.can_visualize_problem {
            lines.push(format!("Volunteers when the problem can be pictured: {}", yes_no(v)));
        }
        if let Some(v) = self.recognizes_familiar_pattern {
            lines.push(format!("Volunteers when a familiar pattern appears: {}", yes_no(v)));
        }
        lines
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Text-to-speech parameters for one student's voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_language_code")]
    pub language_code: String,
    pub voice_name: String,
    /// Semitones, in `[-20, 20]`.
    #[serde(default)]
    pub pitch: f64,
    /// Multiplier, in `[0.25, 4]`.
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f64,
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_speaking_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    /// Free-form tag such as "algorithmic", "visual" or "struggling".
    pub learning_style: String,
    pub description: String,
    pub traits: StudentTraits,
    pub strengths: Vec<String>,
    pub challenges: Vec<String>,
    pub hand_raising_criteria: HandRaisingCriteria,
    pub response_patterns: Vec<String>,
    pub thinking_approach: String,
    pub voice_settings: VoiceSettings,
}

impl StudentProfile {
    /// Checks the numeric ranges serde cannot express.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ProfileError::Invalid(
                    self.id.clone(),
                    format!("{name} must be within [0, 1], got {value}"),
                ))
            }
        };
        if self.id.trim().is_empty() {
            return Err(ProfileError::Invalid(
                self.name.clone(),
                "id must not be empty".to_string(),
            ));
        }
        unit("confidence_level", self.traits.confidence_level)?;
        unit(
            "participation_willingness",
            self.traits.participation_willingness,
        )?;
        unit(
            "comfort_with_ambiguity",
            self.hand_raising_criteria.comfort_with_ambiguity,
        )?;
        if !(-20.0..=20.0).contains(&self.voice_settings.pitch) {
            return Err(ProfileError::Invalid(
                self.id.clone(),
                format!(
                    "pitch must be within [-20, 20], got {}",
                    self.voice_settings.pitch
                ),
            ));
        }
        if !(0.25..=4.0).contains(&self.voice_settings.speaking_rate) {
            return Err(ProfileError::Invalid(
                self.id.clone(),
                format!(
                    "speaking_rate must be within [0.25, 4], got {}",
                    self.voice_settings.speaking_rate
                ),
            ));
        }
        Ok(())
    }

    /// The public roster entry for this profile.
    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            learning_style: self.learning_style.clone(),
            description: self.description.clone(),
        }
    }
}

/// What the roster endpoint exposes about a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudentSummary {
    #[schema(example = "vex")]
    pub id: String,
    #[schema(example = "Vex")]
    pub name: String,
    #[schema(example = "algorithmic")]
    pub learning_style: String,
    pub description: String,
}

/// Parses and validates a single profile file.
pub fn load_profile(path: &Path) -> Result<StudentProfile, ProfileError> {
    let text = std::fs::read_to_string(path).map_err(|e| ProfileError::Io(path.to_path_buf(), e))?;
    let profile: StudentProfile =
        serde_yaml::from_str(&text).map_err(|e| ProfileError::Parse(path.to_path_buf(), e))?;
    profile.validate()?;
    Ok(profile)
}

/// Loads every `*.yaml` profile in a directory, sorted by file name.
///
/// The returned order is the registration order of the classroom. Files that
/// fail to load are skipped with a warning so one bad profile does not take
/// the whole roster down.
pub fn load_profiles(dir: &Path) -> Result<Vec<StudentProfile>, ProfileError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ProfileError::Directory(dir.to_path_buf(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("yaml"))
        .collect();
    paths.sort();

    let mut profiles = Vec::with_capacity(paths.len());
    for path in paths {
        match load_profile(&path) {
            Ok(profile) => {
                if profiles.iter().any(|p: &StudentProfile| p.id == profile.id) {
                    warn!(path = %path.display(), id = %profile.id, "Duplicate profile id, skipping");
                    continue;
                }
                profiles.push(profile);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable profile"),
        }
    }
    info!(count = profiles.len(), dir = %dir.display(), "Student profiles loaded");
    Ok(profiles)
}
