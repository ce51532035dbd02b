//! Main Entrypoint for the Classroom Rehearsal API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading prompt templates and student profiles.
//! 3. Initializing the generation and speech clients.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use rehearsal_api::{
    config::Config,
    router::{cors_layer, create_router},
    state::AppState,
};
use rehearsal_core::{
    llm_client::{GenerationClient, OpenAICompatibleClient},
    profile::load_profiles,
    prompts::PromptLibrary,
    voice::{GoogleTtsClient, SpeechSynthesizer},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Prompts and Profiles ---
    let prompts = PromptLibrary::load(&config.prompts_path).context("Failed to load prompts")?;
    let profiles =
        load_profiles(&config.profiles_path).context("Failed to load student profiles")?;
    if profiles.is_empty() {
        warn!(path = %config.profiles_path.display(), "No student profiles loaded; the classroom is empty");
    }

    // --- 4. Initialize Shared Services ---
    info!(provider = ?config.provider, api_base = %config.api_base(), "Using generation provider.");
    let student_client: Arc<dyn GenerationClient> = Arc::new(OpenAICompatibleClient::new(
        config.generation_config(),
        config.model_id(&config.student_model),
        config.upstream_timeout,
    ));
    let coach_client: Arc<dyn GenerationClient> = Arc::new(OpenAICompatibleClient::new(
        config.generation_config(),
        config.model_id(&config.coach_model),
        config.upstream_timeout,
    ));

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = match &config.tts_api_key {
        Some(key) => Some(Arc::new(GoogleTtsClient::new(
            key.clone(),
            Some(config.tts_model.clone()),
            config.upstream_timeout,
        ))),
        None => {
            warn!("TTS_API_KEY not set; audio responses will be empty");
            None
        }
    };

    let app_state = Arc::new(AppState::new(
        profiles,
        prompts,
        student_client,
        coach_client,
        synthesizer,
    ));

    // --- 5. Create Router and Apply Middleware ---
    let origin_pattern = config
        .allowed_origin_regex
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .context("Invalid ALLOWED_ORIGIN_REGEX")?;
    let cors = cors_layer(&config.allowed_origins, origin_pattern);

    let app = create_router(app_state.clone()).layer(cors);

    // --- 6. Start Server ---
    info!(
        students = app_state.profiles.len(),
        student_model = %config.student_model,
        coach_model = %config.coach_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
