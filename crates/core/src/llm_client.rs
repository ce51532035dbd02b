//! Structured Generation Client
//!
//! Every component that talks to the language model goes through the
//! [`GenerationClient`] trait: given a system instruction and a content
//! payload, return a JSON object conforming to a schema, or fail with a typed
//! [`GenerationError`]. Schema validation happens here, at the adapter
//! boundary, so callers only ever see a well-typed value or an explicit error.

use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Request(String),
    #[error("Generation request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Generation response had no content")]
    EmptyResponse,
    #[error("Generation response was not valid JSON for '{schema}': {reason}")]
    Malformed { schema: String, reason: String },
    #[error("Generation response violated '{schema}': {reason}")]
    Invalid { schema: String, reason: String },
}

impl GenerationError {
    /// True when the model answered but the answer had the wrong shape.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            GenerationError::EmptyResponse
                | GenerationError::Malformed { .. }
                | GenerationError::Invalid { .. }
        )
    }
}

/// One piece of the user-side content of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Binary content already encoded as base64, e.g. a lesson-plan PDF.
    InlineData {
        mime_type: String,
        data_base64: String,
    },
}

/// A fully described, provider-agnostic generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub parts: Vec<ContentPart>,
    /// Name of the output schema; also used to label the call in logs.
    pub schema_name: &'static str,
    pub schema: Value,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Builds a request whose output schema is derived from `T`.
    pub fn for_output<T: StructuredOutput>(
        system_instruction: impl Into<String>,
        parts: Vec<ContentPart>,
        temperature: f32,
    ) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({}));
        Self {
            system_instruction: system_instruction.into(),
            parts,
            schema_name: T::NAME,
            schema,
            temperature,
        }
    }
}

/// A type the model can be asked to produce.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Schema name sent to the provider.
    const NAME: &'static str;

    /// Checks constraints the JSON schema alone does not enforce.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// The generation capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Issues one call and returns the decoded JSON object.
    async fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError>;
}

/// Issues one call and decodes the result into `T`, then validates it.
pub async fn generate_structured<T: StructuredOutput>(
    client: &dyn GenerationClient,
    request: GenerationRequest,
) -> Result<T, GenerationError> {
    let value = client.generate(request).await?;
    let output: T = serde_json::from_value(value).map_err(|e| GenerationError::Invalid {
        schema: T::NAME.to_string(),
        reason: e.to_string(),
    })?;
    if let Err(reason) = output.validate() {
        return Err(GenerationError::Invalid {
            schema: T::NAME.to_string(),
            reason,
        });
    }
    Ok(output)
}

/// Decodes a model's text answer as a JSON object.
///
/// Some models wrap JSON in a Markdown code fence even when asked not to, so a
/// single surrounding fence is removed before decoding.
pub fn parse_json_content(schema: &str, content: &str) -> Result<Value, GenerationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: Value = serde_json::from_str(unfenced).map_err(|e| GenerationError::Malformed {
        schema: schema.to_string(),
        reason: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(GenerationError::Malformed {
            schema: schema.to_string(),
            reason: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}

/// A [`GenerationClient`] for any OpenAI-compatible chat completions API.
///
/// This covers OpenAI itself as well as Gemini and Vertex AI through their
/// OpenAI-compatible endpoints. Every call carries its own timeout.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the provider.
    /// * `model` - Model identifier (e.g., "gemini-2.5-flash").
    /// * `timeout` - Upper bound for a single call.
    pub fn new(config: OpenAIConfig, model: String, timeout: Duration) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            timeout,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let content: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({ "type": "text", "text": text }),
                ContentPart::InlineData {
                    mime_type,
                    data_base64,
                } => json!({
                    "type": "file",
                    "file": {
                        "filename": "attachment",
                        "file_data": format!("data:{mime_type};base64,{data_base64}"),
                    }
                }),
            })
            .collect();

        json!({
            "model": self.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system_instruction },
                { "role": "user", "content": content },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                }
            }
        })
    }
}

#[async_trait]
impl GenerationClient for OpenAICompatibleClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        let body = self.build_body(&request);
        debug!(model = %self.model, schema = request.schema_name, "Issuing generation call");

        let chat = self.client.chat();
        let call = chat.create_byot(body);
        let response: Value = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))?
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or(GenerationError::EmptyResponse)?;
        parse_json_content(request.schema_name, content)
    }
}
