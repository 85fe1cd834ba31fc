//! services/api/src/adapters/stt.rs
//!
//! This module contains the adapter for OpenAI's Speech-to-Text (Whisper) service.
//! It implements the `SpeechToTextService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{AudioInput, CreateTranscriptionRequest},
    Client,
};
use async_trait::async_trait;
use lingua_core::ports::{PortError, PortResult, SpeechToTextService};
use tracing::info;

/// Maps a target-language code to the transcription locale hint. Unknown
/// codes fall back to English.
fn locale(language: &str) -> &'static str {
    match language {
        "fr" => "fr",
        "es" => "es",
        _ => "en",
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechToTextService` port using the OpenAI Whisper API.
#[derive(Clone)]
pub struct OpenAiSttAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSttAdapter {
    /// Creates a new `OpenAiSttAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `SpeechToTextService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechToTextService for OpenAiSttAdapter {
    /// Transcribes a slice of audio data into text using the configured model.
    async fn transcribe(&self, audio_data: &[u8], language: &str) -> PortResult<String> {
        let input = AudioInput::from_vec_u8("turn_audio.wav".into(), audio_data.to_vec());

        let request = CreateTranscriptionRequest {
            file: input,
            model: self.model.clone(),
            language: Some(locale(language).to_string()),
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .transcription()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let preview: String = response.text.chars().take(120).collect();
        info!("Transcription result: '{}'", preview);
        Ok(response.text)
    }
}
