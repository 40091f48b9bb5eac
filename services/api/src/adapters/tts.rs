//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapters for the `TextToSpeechService` port: one backed
//! by OpenAI's speech API and one used when no speech credential is configured.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use photo_story_core::ports::{PortError, PortResult, TextToSpeechService};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `TextToSpeechService` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiTtsAdapter {
    /// Creates a new `OpenAiTtsAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }
}

/// Maps a configured voice name onto the API's voice.
pub fn parse_voice(name: &str) -> Option<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

//=========================================================================================
// `TextToSpeechService` Trait Implementations
//=========================================================================================

#[async_trait]
impl TextToSpeechService for OpenAiTtsAdapter {
    /// Generates MP3 audio for the given text. The speech model detects the
    /// language from the text itself, so the code is only recorded.
    async fn generate_audio(&self, text: &str, language: &str) -> PortResult<Vec<u8>> {
        debug!(language, chars = text.chars().count(), "Requesting speech synthesis");

        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            ..Default::default()
        };

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.bytes.to_vec())
    }
}

/// Stands in for the speech engine when narration is not configured.
#[derive(Clone, Default)]
pub struct UnavailableTtsAdapter;

#[async_trait]
impl TextToSpeechService for UnavailableTtsAdapter {
    async fn generate_audio(&self, _text: &str, _language: &str) -> PortResult<Vec<u8>> {
        Err(PortError::Unavailable(
            "narration requires OPENAI_API_KEY to be configured".to_string(),
        ))
    }
}
