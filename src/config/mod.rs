//! Configuration management
//!
//! Precedence, highest first: command-line flags (and their env vars),
//! the settings file, built-in defaults. Secrets are resolved separately
//! by [`SecretResolver`].

pub mod file;
pub mod secrets;

use std::path::PathBuf;
use std::sync::Arc;

pub use secrets::{SecretResolver, SecretSource, Secrets};

use crate::llm::{ChatCompletions, DEFAULT_LLM_MODEL};
use crate::pipeline::{CompletionParams, TurnPipeline};
use crate::voice::{
    DEFAULT_STT_BASE_URL, DEFAULT_STT_MODEL, DEFAULT_TTS_BASE_URL, DEFAULT_TTS_MODEL,
    DEFAULT_VOICE_ID, SpeechToText, TextToSpeech,
};
use crate::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8501;

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to persona.json
    pub persona_path: PathBuf,

    /// Path to facts.json
    pub facts_path: PathBuf,

    /// Secrets file (highest priority secret source)
    pub secrets_path: PathBuf,

    /// dotenv file (lowest priority secret source)
    pub env_path: PathBuf,

    /// HTTP server port
    pub port: u16,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Transcription and synthesis configuration
    pub voice: VoiceConfig,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,

    /// Reply length bound in tokens
    pub max_tokens: u32,
}

/// Transcription and synthesis configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// OpenAI-compatible transcription API root
    pub stt_base_url: String,

    /// Whisper model
    pub stt_model: String,

    /// ElevenLabs API root
    pub tts_base_url: String,

    /// ElevenLabs voice identifier
    pub tts_voice: String,

    /// ElevenLabs model identifier
    pub tts_model: String,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = CompletionParams::default();
        Self {
            persona_path: PathBuf::from("persona.json"),
            facts_path: PathBuf::from("facts.json"),
            secrets_path: PathBuf::from(secrets::DEFAULT_SECRETS_FILE),
            env_path: PathBuf::from(secrets::DEFAULT_ENV_FILE),
            port: DEFAULT_PORT,
            llm: LlmConfig {
                model: DEFAULT_LLM_MODEL.to_string(),
                temperature: defaults.temperature,
                max_tokens: defaults.max_tokens,
            },
            voice: VoiceConfig {
                stt_base_url: DEFAULT_STT_BASE_URL.to_string(),
                stt_model: DEFAULT_STT_MODEL.to_string(),
                tts_base_url: DEFAULT_TTS_BASE_URL.to_string(),
                tts_voice: DEFAULT_VOICE_ID.to_string(),
                tts_model: DEFAULT_TTS_MODEL.to_string(),
            },
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub settings_path: Option<PathBuf>,
    pub persona_path: Option<PathBuf>,
    pub facts_path: Option<PathBuf>,
    pub secrets_path: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
    pub port: Option<u16>,
}

impl Config {
    /// Load configuration from the settings file and command-line overrides
    ///
    /// # Errors
    ///
    /// Returns error if an explicit settings file is unreadable or the
    /// merged values are out of range
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let settings = file::load_settings_file(overrides.settings_path.as_deref())?;
        Self::merge(settings, overrides)
    }

    /// Merge a parsed settings file with overrides on top of defaults
    ///
    /// # Errors
    ///
    /// Returns error if the merged values are out of range
    pub fn merge(settings: file::SettingsFile, overrides: &ConfigOverrides) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            persona_path: overrides
                .persona_path
                .clone()
                .or(settings.persona.persona_path)
                .unwrap_or(defaults.persona_path),
            facts_path: overrides
                .facts_path
                .clone()
                .or(settings.persona.facts_path)
                .unwrap_or(defaults.facts_path),
            secrets_path: overrides
                .secrets_path
                .clone()
                .or(settings.secrets.file)
                .unwrap_or(defaults.secrets_path),
            env_path: overrides
                .env_path
                .clone()
                .or(settings.secrets.env_file)
                .unwrap_or(defaults.env_path),
            port: overrides
                .port
                .or(settings.server.port)
                .unwrap_or(defaults.port),
            llm: LlmConfig {
                model: settings.llm.model.unwrap_or(defaults.llm.model),
                temperature: settings
                    .llm
                    .temperature
                    .unwrap_or(defaults.llm.temperature),
                max_tokens: settings.llm.max_tokens.unwrap_or(defaults.llm.max_tokens),
            },
            voice: VoiceConfig {
                stt_base_url: settings
                    .voice
                    .stt_base_url
                    .unwrap_or(defaults.voice.stt_base_url),
                stt_model: settings.voice.stt_model.unwrap_or(defaults.voice.stt_model),
                tts_base_url: settings
                    .voice
                    .tts_base_url
                    .unwrap_or(defaults.voice.tts_base_url),
                tts_voice: settings.voice.tts_voice.unwrap_or(defaults.voice.tts_voice),
                tts_model: settings.voice.tts_model.unwrap_or(defaults.voice.tts_model),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".to_string()));
        }
        if self.voice.tts_voice.trim().is_empty() {
            return Err(Error::Config("tts_voice must not be empty".to_string()));
        }
        Ok(())
    }

    /// Secret resolver for the configured file locations
    #[must_use]
    pub fn secret_resolver(&self) -> SecretResolver {
        SecretResolver::standard(self.secrets_path.clone(), self.env_path.clone())
    }

    /// Sampling parameters for the pipeline
    #[must_use]
    pub const fn completion_params(&self) -> CompletionParams {
        CompletionParams {
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
        }
    }

    /// Build the speech-to-text client
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty
    pub fn speech_to_text(&self, secrets: &Secrets) -> Result<SpeechToText> {
        SpeechToText::new(
            secrets.groq_api_key.clone(),
            self.voice.stt_base_url.clone(),
            self.voice.stt_model.clone(),
        )
    }

    /// Build the text-to-speech client
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty
    pub fn text_to_speech(&self, secrets: &Secrets) -> Result<TextToSpeech> {
        TextToSpeech::new(
            secrets.elevenlabs_api_key.clone(),
            self.voice.tts_base_url.clone(),
            self.voice.tts_voice.clone(),
            self.voice.tts_model.clone(),
        )
    }

    /// Build the turn pipeline wired to the real providers
    ///
    /// # Errors
    ///
    /// Returns error if any provider client cannot be constructed
    pub fn build_pipeline(&self, secrets: &Secrets) -> Result<TurnPipeline> {
        let transcriber = Arc::new(self.speech_to_text(secrets)?);
        let model = Arc::new(ChatCompletions::new(
            secrets.openai_api_key.clone(),
            &secrets.openai_base_url,
            self.llm.model.clone(),
        )?);
        let synthesizer = Arc::new(self.text_to_speech(secrets)?);

        tracing::info!(
            stt_model = %self.voice.stt_model,
            llm_model = %model.model(),
            tts_model = %self.voice.tts_model,
            "pipeline providers ready"
        );

        Ok(TurnPipeline::new(
            transcriber,
            model,
            synthesizer,
            self.completion_params(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_constants() {
        let config = Config::merge(file::SettingsFile::default(), &ConfigOverrides::default())
            .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 250);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.voice.stt_model, "whisper-large-v3-turbo");
        assert_eq!(config.voice.tts_voice, "WU3NNr4InTpWBvdLxgpD");
        assert_eq!(config.voice.tts_model, "eleven_turbo_v2_5");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn overrides_beat_settings_file() {
        let settings: file::SettingsFile = toml::from_str(
            "[server]\nport = 9000\n[persona]\npersona_path = \"file.json\"\n",
        )
        .unwrap();
        let overrides = ConfigOverrides {
            port: Some(7000),
            ..ConfigOverrides::default()
        };

        let config = Config::merge(settings, &overrides).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.persona_path, PathBuf::from("file.json"));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let settings: file::SettingsFile = toml::from_str("[llm]\ntemperature = 3.5\n").unwrap();
        let result = Config::merge(settings, &ConfigOverrides::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let settings: file::SettingsFile = toml::from_str("[llm]\nmax_tokens = 0\n").unwrap();
        assert!(Config::merge(settings, &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn completion_params_follow_config() {
        let settings: file::SettingsFile =
            toml::from_str("[llm]\nmax_tokens = 120\ntemperature = 0.2\n").unwrap();
        let config = Config::merge(settings, &ConfigOverrides::default()).unwrap();
        let params = config.completion_params();
        assert_eq!(params.max_tokens, 120);
        assert!((params.temperature - 0.2).abs() < f32::EPSILON);
    }
}
