//! TOML settings file loading
//!
//! Looks for `persona-voice.toml` in the working directory, then in the
//! user config directory (`~/.config/persona-voice/` on Linux). All fields
//! are optional: the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "persona-voice.toml";

/// Top-level settings file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    /// Persona documents
    #[serde(default)]
    pub persona: PersonaFileConfig,

    /// Language model
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Transcription and synthesis
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Secret source locations
    #[serde(default)]
    pub secrets: SecretsFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonaFileConfig {
    /// Path to persona.json
    pub persona_path: Option<PathBuf>,

    /// Path to facts.json
    pub facts_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Reply length bound
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceFileConfig {
    /// OpenAI-compatible transcription API root
    pub stt_base_url: Option<String>,

    /// Whisper model (e.g. "whisper-large-v3-turbo")
    pub stt_model: Option<String>,

    /// ElevenLabs API root
    pub tts_base_url: Option<String>,

    /// ElevenLabs voice identifier
    pub tts_voice: Option<String>,

    /// ElevenLabs model identifier
    pub tts_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerFileConfig {
    /// HTTP port
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretsFileConfig {
    /// TOML secrets file
    pub file: Option<PathBuf>,

    /// dotenv file
    pub env_file: Option<PathBuf>,
}

/// Load the settings file
///
/// An explicit path must exist and parse. Without one, the standard
/// locations are searched and an unreadable file falls back to defaults.
///
/// # Errors
///
/// Returns error if an explicitly named file cannot be read or parsed
pub fn load_settings_file(explicit: Option<&Path>) -> Result<SettingsFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let settings = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded settings file");
        return Ok(settings);
    }

    let Some(path) = settings_file_candidates().into_iter().find(|p| p.exists()) else {
        return Ok(SettingsFile::default());
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                tracing::info!(path = %path.display(), "loaded settings file");
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse settings file, using defaults"
                );
                Ok(SettingsFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read settings file"
            );
            Ok(SettingsFile::default())
        }
    }
}

/// Standard settings file locations, highest priority first
#[must_use]
pub fn settings_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(SETTINGS_FILE_NAME)];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "persona-voice") {
        candidates.push(dirs.config_dir().join(SETTINGS_FILE_NAME));
    }
    candidates
}
