//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::AudioClip;
use crate::pipeline::Transcriber;
use crate::{Error, Result};

/// Groq's OpenAI-compatible endpoint
pub const DEFAULT_STT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default Whisper model
pub const DEFAULT_STT_MODEL: &str = "whisper-large-v3-turbo";

/// Transcribes speech via an OpenAI-compatible Whisper endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, base_url: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "API key required for Whisper transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe_clip(&self, clip: &AudioClip) -> Result<String> {
        tracing::debug!(
            audio_bytes = clip.bytes.len(),
            model = %self.model,
            "starting Whisper transcription"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(clip.bytes.clone())
                    .file_name(format!("audio.{}", clip.format.extension()))
                    .mime_str(clip.format.mime())
                    .map_err(|e| Error::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "text");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Transcription(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        // `response_format=text` returns the bare transcript
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;

        tracing::info!(chars = text.len(), "transcription complete");
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        self.transcribe_clip(clip).await
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}
