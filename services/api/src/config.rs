use async_openai::config::OpenAIConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Origins allowed when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "https://multi-agent-frontend-847407960490.us-central1.run.app",
    "https://builder.io",
    "https://cdn.builder.io",
];

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported providers for the generation capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Vertex,
    OpenAI,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub google_cloud_project: Option<String>,
    pub google_cloud_location: String,
    pub vertex_access_token: Option<String>,
    pub student_model: String,
    pub coach_model: String,
    pub tts_api_key: Option<String>,
    pub tts_model: String,
    pub upstream_timeout: Duration,
    pub allowed_origins: Vec<String>,
    pub allowed_origin_regex: Option<String>,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub profiles_path: PathBuf,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:8000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = var_or("LLM_PROVIDER", "gemini");
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "vertex" => Provider::Vertex,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{other}' is not one of gemini, vertex, openai"),
                ));
            }
        };

        let openai_api_key = non_empty_var("OPENAI_API_KEY");
        let gemini_api_key = non_empty_var("GEMINI_API_KEY");
        let google_cloud_project = non_empty_var("GOOGLE_CLOUD_PROJECT");
        let google_cloud_location = var_or("GOOGLE_CLOUD_LOCATION", "us-central1");
        let vertex_access_token = non_empty_var("VERTEX_ACCESS_TOKEN");

        let student_model = var_or("STUDENT_MODEL", "gemini-2.5-flash-lite");
        let coach_model = var_or("COACH_MODEL", "gemini-2.5-flash");
        let tts_api_key = non_empty_var("TTS_API_KEY");
        let tts_model = var_or("TTS_MODEL", "gemini-2.5-flash-tts");

        let timeout_str = var_or("UPSTREAM_TIMEOUT_SECS", "30");
        let upstream_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "UPSTREAM_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let allowed_origins = match non_empty_var("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
        };

        let allowed_origin_regex = non_empty_var("ALLOWED_ORIGIN_REGEX");
        if let Some(pattern) = &allowed_origin_regex {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidValue("ALLOWED_ORIGIN_REGEX".to_string(), e.to_string())
            })?;
        }

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = PathBuf::from(var_or("PROMPTS_PATH", "./prompts"));
        let profiles_path = PathBuf::from(var_or("PROFILES_PATH", "./profiles"));

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
            Provider::Vertex => {
                if google_cloud_project.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GOOGLE_CLOUD_PROJECT must be set for 'vertex' provider".to_string(),
                    ));
                }
                if vertex_access_token.is_none() {
                    return Err(ConfigError::MissingVar(
                        "VERTEX_ACCESS_TOKEN must be set for 'vertex' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            google_cloud_project,
            google_cloud_location,
            vertex_access_token,
            student_model,
            coach_model,
            tts_api_key,
            tts_model,
            upstream_timeout,
            allowed_origins,
            allowed_origin_regex,
            log_level,
            prompts_path,
            profiles_path,
        })
    }

    /// Base URL of the provider's OpenAI-compatible endpoint.
    pub fn api_base(&self) -> String {
        match self.provider {
            Provider::OpenAI => OPENAI_API_BASE.to_string(),
            Provider::Gemini => GEMINI_API_BASE.to_string(),
            Provider::Vertex => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/endpoints/openapi",
                location = self.google_cloud_location,
                project = self.google_cloud_project.as_deref().unwrap_or_default(),
            ),
        }
    }

    /// Client configuration for the generation capability.
    pub fn generation_config(&self) -> OpenAIConfig {
        let key = match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Vertex => self.vertex_access_token.as_deref(),
        };
        OpenAIConfig::new()
            .with_api_key(key.unwrap_or_default())
            .with_api_base(self.api_base())
    }

    /// Model identifier as the provider expects it.
    ///
    /// Vertex AI's OpenAI-compatible endpoint wants publisher-qualified names.
    pub fn model_id(&self, model: &str) -> String {
        match self.provider {
            Provider::Vertex if !model.contains('/') => format!("google/{model}"),
            _ => model.to_string(),
        }
    }
}
