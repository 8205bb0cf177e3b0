//! Turn pipeline: transcribe, reply, speak
//!
//! One run per recorded clip. The three provider calls are awaited in
//! sequence and the session is borrowed mutably for the whole run, so a
//! session never sees two runs at once.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::conversation::Turn;
use crate::session::Session;
use crate::voice::{AudioClip, SynthesizedAudio};
use crate::{Error, Result};

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a clip to plain text
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Language-model completion capability
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next assistant message for the given history
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails
    async fn complete(&self, turns: &[Turn], params: &CompletionParams) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize speech, returning the complete audio buffer
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Sampling parameters for completions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    /// Upper bound on reply length; keeps answers short enough to speak
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 250,
            temperature: 0.7,
        }
    }
}

/// Stage of the pipeline, for "working" indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Transcribing,
    AwaitingCompletion,
    Synthesizing,
}

impl PipelineState {
    /// Short label for progress indicators
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Transcribing => "Listening...",
            Self::AwaitingCompletion => "Thinking...",
            Self::Synthesizing => "Speaking...",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a run ended when it did not fail outright
#[derive(Debug)]
pub enum TurnOutcome {
    /// Transcript was empty or whitespace; nothing was recorded
    Silent,

    /// Reply produced and its audio is waiting in the session
    Spoken { transcript: String, reply: String },

    /// Reply produced but speech synthesis failed
    TextOnly {
        transcript: String,
        reply: String,
        error: Error,
    },
}

impl TurnOutcome {
    #[must_use]
    pub fn transcript(&self) -> Option<&str> {
        match self {
            Self::Silent => None,
            Self::Spoken { transcript, .. } | Self::TextOnly { transcript, .. } => {
                Some(transcript)
            }
        }
    }

    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Silent => None,
            Self::Spoken { reply, .. } | Self::TextOnly { reply, .. } => Some(reply),
        }
    }

    /// Non-fatal problem worth showing to the user
    #[must_use]
    pub const fn notice(&self) -> Option<&Error> {
        match self {
            Self::TextOnly { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Stable outcome name for API responses
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Spoken { .. } => "spoken",
            Self::TextOnly { .. } => "text_only",
        }
    }
}

/// Resets the published state to `Idle` on every exit path
struct ReturnToIdle<'a>(&'a watch::Sender<PipelineState>);

impl Drop for ReturnToIdle<'_> {
    fn drop(&mut self) {
        self.0.send_replace(PipelineState::Idle);
    }
}

/// Orchestrates one conversational turn per audio clip
pub struct TurnPipeline {
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn Synthesizer>,
    params: CompletionParams,
    state: watch::Sender<PipelineState>,
}

impl TurnPipeline {
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn ChatModel>,
        synthesizer: Arc<dyn Synthesizer>,
        params: CompletionParams,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            transcriber,
            model,
            synthesizer,
            params,
            state,
        }
    }

    /// Watch stage changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Current stage
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Run one turn for a freshly recorded clip
    ///
    /// On `Err` the log is left consistent: a transcription failure adds
    /// nothing, a completion failure keeps the user turn.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` or `Error::Completion`. Synthesis
    /// failures are reported through [`TurnOutcome::TextOnly`].
    pub async fn run(&self, session: &mut Session, clip: AudioClip) -> Result<TurnOutcome> {
        let _idle = ReturnToIdle(&self.state);
        session.bump_generation();

        self.state.send_replace(PipelineState::Transcribing);
        let transcript = self.transcribe(clip).await?;

        let transcript = transcript.trim();
        if transcript.is_empty() {
            // Silence or noise; treated as a no-op rather than an error
            tracing::info!(session_id = %session.id(), "empty transcript, turn dropped");
            return Ok(TurnOutcome::Silent);
        }
        let transcript = transcript.to_string();

        session.log_mut().push_user(transcript.clone());

        self.state.send_replace(PipelineState::AwaitingCompletion);
        let reply = self.complete(session).await?;
        session.log_mut().push_assistant(reply.clone());

        self.state.send_replace(PipelineState::Synthesizing);
        match self.synthesize(&reply).await {
            Ok(audio) => {
                session.set_pending_audio(audio);
                tracing::info!(
                    session_id = %session.id(),
                    turns = session.log().len(),
                    "turn complete"
                );
                Ok(TurnOutcome::Spoken { transcript, reply })
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %session.id(),
                    error = %error,
                    "speech synthesis failed, replying with text only"
                );
                Ok(TurnOutcome::TextOnly {
                    transcript,
                    reply,
                    error,
                })
            }
        }
    }

    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        if clip.is_empty() {
            return Err(Error::Transcription("recording is empty".to_string()));
        }

        tracing::debug!(
            provider = self.transcriber.name(),
            bytes = clip.bytes.len(),
            format = clip.format.extension(),
            "transcribing clip"
        );

        let text = self.transcriber.transcribe(&clip).await.map_err(|e| match e {
            Error::Transcription(_) => e,
            other => Error::Transcription(other.to_string()),
        })?;

        tracing::debug!(transcript = %text, "transcription received");
        Ok(text)
    }

    async fn complete(&self, session: &Session) -> Result<String> {
        tracing::debug!(
            provider = self.model.name(),
            turns = session.log().len(),
            max_tokens = self.params.max_tokens,
            "requesting completion"
        );

        let reply = self
            .model
            .complete(session.log().turns(), &self.params)
            .await
            .map_err(|e| match e {
                Error::Completion(_) => e,
                other => Error::Completion(other.to_string()),
            })?;

        if reply.trim().is_empty() {
            return Err(Error::Completion("model returned an empty reply".to_string()));
        }
        Ok(reply)
    }

    async fn synthesize(&self, reply: &str) -> Result<SynthesizedAudio> {
        tracing::debug!(
            provider = self.synthesizer.name(),
            chars = reply.len(),
            "synthesizing reply"
        );

        let bytes = self.synthesizer.synthesize(reply).await.map_err(|e| match e {
            Error::Synthesis(_) => e,
            other => Error::Synthesis(other.to_string()),
        })?;

        if bytes.is_empty() {
            return Err(Error::Synthesis("provider returned no audio".to_string()));
        }
        Ok(SynthesizedAudio { bytes })
    }
}
