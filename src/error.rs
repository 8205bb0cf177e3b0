//! Error types for the persona voice assistant

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for persona voice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the persona voice assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Persona or fact sheet could not be read or parsed (fatal at startup)
    #[error("failed to load {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    /// Required secrets are absent from every configured source
    #[error("missing API keys: {}", .0.join(", "))]
    MissingSecrets(Vec<String>),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech-to-text error
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Language model completion error
    #[error("completion failed: {0}")]
    Completion(String),

    /// Text-to-speech error
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the session can continue after this error
    ///
    /// Per-turn provider failures abort only the current turn; everything
    /// else is a startup or environment problem.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transcription(_) | Self::Completion(_) | Self::Synthesis(_)
        )
    }

    /// Short machine-readable code for API responses
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DataLoad { .. } => "data_load_failed",
            Self::MissingSecrets(_) => "missing_secrets",
            Self::Config(_) => "config",
            Self::Transcription(_) => "transcription_failed",
            Self::Completion(_) => "completion_failed",
            Self::Synthesis(_) => "synthesis_failed",
            Self::Audio(_) => "audio",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::Toml(_) => "toml",
        }
    }
}
