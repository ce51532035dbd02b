//! Prompt Templates
//!
//! System prompts live as Markdown files on disk, keyed by file stem, so the
//! wording can change without a rebuild. Placeholders use `{name}` syntax and
//! are replaced literally.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const STUDENT_AGENT: &str = "student_agent";
pub const TEACHER_FEEDBACK: &str = "teacher_feedback";
pub const LESSON_SUMMARY: &str = "lesson_summary";
pub const LESSON_ANALYSIS: &str = "lesson_analysis";

const REQUIRED: [&str; 4] = [
    STUDENT_AGENT,
    TEACHER_FEEDBACK,
    LESSON_SUMMARY,
    LESSON_ANALYSIS,
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read prompts from {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Missing prompt template: '{0}'")]
    Missing(String),
}

/// The set of templates used by the agents.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    pub student_agent: String,
    pub teacher_feedback: String,
    pub lesson_summary: String,
    pub lesson_analysis: String,
}

impl PromptLibrary {
    /// Builds the library from a map of template name to contents.
    pub fn from_map(mut prompts: HashMap<String, String>) -> Result<Self, PromptError> {
        if let Some(missing) = REQUIRED.iter().find(|k| !prompts.contains_key(**k)) {
            return Err(PromptError::Missing(missing.to_string()));
        }
        let mut take = |key: &str| prompts.remove(key).unwrap_or_default();
        Ok(Self {
            student_agent: take(STUDENT_AGENT),
            teacher_feedback: take(TEACHER_FEEDBACK),
            lesson_summary: take(LESSON_SUMMARY),
            lesson_analysis: take(LESSON_ANALYSIS),
        })
    }

    /// Loads every `*.md` file in a directory.
    pub fn load(dir: &Path) -> Result<Self, PromptError> {
        let io_err = |e| PromptError::Io(dir.display().to_string(), e);
        let mut prompts = HashMap::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let content = std::fs::read_to_string(&path).map_err(io_err)?;
                prompts.insert(key.to_string(), content);
            }
        }
        Self::from_map(prompts)
    }
}

/// Replaces each `{key}` in the template with its value.
///
/// The template is scanned once. Inserted values are never scanned again, so
/// a value containing `{key}` text is kept verbatim.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let found = tail.find('}').and_then(|close| {
            let key = &tail[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match found {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Formats items as a bullet list, or a placeholder when there are none.
pub fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none provided)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
