//! Voice Rendering
//!
//! Turns a student's utterance into MP3 audio using the student's voice
//! settings. Missing audio is never an error for the conversation, so the
//! [`VoiceRenderer`] swallows synthesis failures and simply reports no audio.

use crate::profile::VoiceSettings;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Synthesis request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Synthesis request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Synthesis service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Synthesis response could not be decoded: {0}")]
    Decode(String),
}

/// The speech synthesis capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns encoded audio bytes for `text` spoken with `voice`.
    async fn synthesize(&self, text: &str, voice: &VoiceSettings)
    -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Google Cloud Text-to-Speech over its REST API.
pub struct GoogleTtsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: Option<String>,
    timeout: Duration,
}

impl GoogleTtsClient {
    pub fn new(api_key: String, model: Option<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_TTS_ENDPOINT.to_string(),
            api_key,
            model,
            timeout,
        }
    }

    /// Points the client at a different endpoint, e.g. a local stub.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_body(&self, text: &str, voice: &VoiceSettings) -> serde_json::Value {
        let mut voice_params = json!({
            "languageCode": voice.language_code,
            "name": voice.voice_name,
        });
        if let Some(model) = &self.model {
            voice_params["modelName"] = json!(model);
        }
        json!({
            "input": { "text": text },
            "voice": voice_params,
            "audioConfig": {
                "audioEncoding": "MP3",
                "pitch": voice.pitch,
                "speakingRate": voice.speaking_rate,
            }
        })
    }

    async fn call(&self, text: &str, voice: &VoiceSettings) -> Result<Vec<u8>, SynthesisError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(&self.build_body(text, voice))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: SynthesizeResponse = response.json().await?;
        let audio = payload
            .audio_content
            .ok_or_else(|| SynthesisError::Decode("missing audioContent".to_string()))?;
        STANDARD
            .decode(audio)
            .map_err(|e| SynthesisError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSettings,
    ) -> Result<Vec<u8>, SynthesisError> {
        tokio::time::timeout(self.timeout, self.call(text, voice))
            .await
            .map_err(|_| SynthesisError::Timeout(self.timeout))?
    }
}

/// Soft-failing adapter over a [`SpeechSynthesizer`].
#[derive(Clone)]
pub struct VoiceRenderer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl VoiceRenderer {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synthesizer }
    }

    /// Renders an utterance, or returns `None` when there is nothing to say
    /// or synthesis failed.
    pub async fn render(&self, utterance: Option<&str>, voice: &VoiceSettings) -> Option<Vec<u8>> {
        let text = match utterance.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => {
                debug!(voice = %voice.voice_name, "No utterance, skipping synthesis");
                return None;
            }
        };

        match self.synthesizer.synthesize(text, voice).await {
            Ok(audio) if !audio.is_empty() => Some(audio),
            Ok(_) => {
                warn!(voice = %voice.voice_name, "Synthesis returned no audio");
                None
            }
            Err(e) => {
                warn!(voice = %voice.voice_name, error = %e, "Synthesis failed, continuing without audio");
                None
            }
        }
    }
}
