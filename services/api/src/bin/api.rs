//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{tts::parse_voice, OpenAiStoryAdapter, OpenAiTtsAdapter, UnavailableTtsAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use axum::Router;
use photo_story_core::ports::TextToSpeechService;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    // A missing model credential stops the service here, before any workflow step.
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let model_config = OpenAIConfig::new()
        .with_api_key(config.gemini_api_key.clone())
        .with_api_base(config.model_api_base.clone());
    let model_adapter = Arc::new(OpenAiStoryAdapter::new(
        Client::with_config(model_config),
        config.story_model.clone(),
    ));
    info!(model = %config.story_model, "Generative model adapter ready");

    let tts_adapter: Arc<dyn TextToSpeechService> = match &config.openai_api_key {
        Some(key) => {
            let voice = parse_voice(&config.tts_voice).ok_or_else(|| {
                ApiError::Internal(format!(
                    "Invalid TTS voice specified in config: '{}'",
                    config.tts_voice
                ))
            })?;
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(key.clone()));
            Arc::new(OpenAiTtsAdapter::new(openai_client, SpeechModel::Tts1Hd, voice))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; narration is disabled.");
            Arc::new(UnavailableTtsAdapter)
        }
    };

    // --- 3. Build the Shared AppState and Router ---
    let app_state = Arc::new(AppState::new(config.clone(), model_adapter, tts_adapter));
    app_state
        .sessions
        .clone()
        .spawn_idle_sweeper(config.session_idle);
    info!(
        idle_secs = config.session_idle.as_secs(),
        "Idle session sweeper started"
    );
    let api_router = build_router(app_state)?;

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 4. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
