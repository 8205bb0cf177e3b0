//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use futures::StreamExt as _;
use secrecy::{ExposeSecret, SecretString};

use crate::pipeline::Synthesizer;
use crate::{Error, Result};

/// ElevenLabs API root
pub const DEFAULT_TTS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Voice the persona speaks with
pub const DEFAULT_VOICE_ID: &str = "WU3NNr4InTpWBvdLxgpD";

/// Low-latency multilingual model
pub const DEFAULT_TTS_MODEL: &str = "eleven_turbo_v2_5";

/// Synthesizes speech from text via ElevenLabs
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    voice_id: String,
    model: String,
}

impl TextToSpeech {
    /// Create a new ElevenLabs TTS client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        api_key: SecretString,
        base_url: String,
        voice_id: String,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            voice_id,
            model,
        })
    }

    /// Synthesize text to speech
    ///
    /// The streaming endpoint is used; chunks are concatenated into one
    /// buffer before returning.
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize_text(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "{}/text-to-speech/{}/stream",
            self.base_url, self.voice_id
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "ElevenLabs TTS error {status}: {body}"
            )));
        }

        let mut audio = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| Error::Synthesis(e.to_string()))?;
            audio.extend_from_slice(&chunk);
        }

        tracing::debug!(
            voice_id = %self.voice_id,
            audio_bytes = audio.len(),
            "synthesis complete"
        );
        Ok(audio)
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.synthesize_text(text).await
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}
