//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub gemini_api_key: String,
    pub model_api_base: String,
    pub story_model: String,
    pub openai_api_key: Option<String>,
    pub tts_voice: String,
    pub tts_language: String,
    pub model_timeout: Duration,
    pub max_images: usize,
    pub max_upload_bytes: usize,
    pub session_idle: Duration,
    pub bgm_dir: PathBuf,
    pub cors_origin: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    /// The model credential is mandatory; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server Settings ---
        let bind_address: SocketAddr = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generative Model ---
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let model_api_base = var_or(
            "MODEL_API_BASE",
            "https://generativelanguage.googleapis.com/v1beta/openai",
        );
        let story_model = var_or("STORY_MODEL", "gemini-flash-lite-latest");

        // --- Narration (optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let tts_voice = var_or("TTS_VOICE", "alloy");
        let tts_language = var_or("TTS_LANGUAGE", "ja");

        // --- Limits ---
        let timeout_secs: u64 = parse_var("MODEL_TIMEOUT_SECS", "60")?;
        let max_images: usize = parse_var("MAX_IMAGES", "5")?;
        if max_images == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_IMAGES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let max_upload_bytes: usize = parse_var("MAX_UPLOAD_BYTES", "10485760")?;
        let session_idle_secs: u64 = parse_var("SESSION_IDLE_SECS", "1800")?;
        if session_idle_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_IDLE_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let bgm_dir = std::env::var("BGM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./bgm"));
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        Ok(Self {
            bind_address,
            log_level,
            gemini_api_key,
            model_api_base,
            story_model,
            openai_api_key,
            tts_voice,
            tts_language,
            model_timeout: Duration::from_secs(timeout_secs),
            max_images,
            max_upload_bytes,
            session_idle: Duration::from_secs(session_idle_secs),
            bgm_dir,
            cors_origin,
        })
    }

    /// A configuration for tests and tools that never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: Level::INFO,
            gemini_api_key: "test-key".to_string(),
            model_api_base: "http://localhost".to_string(),
            story_model: "test-model".to_string(),
            openai_api_key: None,
            tts_voice: "alloy".to_string(),
            tts_language: "ja".to_string(),
            model_timeout: Duration::from_secs(5),
            max_images: 5,
            max_upload_bytes: 10 * 1024 * 1024,
            session_idle: Duration::from_secs(1800),
            bgm_dir: PathBuf::from("./bgm"),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}
