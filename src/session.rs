//! Per-user session context
//!
//! Owns everything that lives exactly as long as one conversation: the
//! log, the recorder generation counter, and the reply audio waiting to
//! be played.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::conversation::ConversationLog;
use crate::persona::PersonaDocuments;
use crate::prompt::build_system_prompt;
use crate::voice::SynthesizedAudio;

/// One active conversation
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    log: ConversationLog,
    generation: u64,
    pending_audio: Option<SynthesizedAudio>,
}

impl Session {
    /// Start a session whose log opens with `system_prompt`
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            log: ConversationLog::new(system_prompt),
            generation: 0,
            pending_audio: None,
        };
        tracing::info!(session_id = %session.id, "session started");
        session
    }

    /// Start a session for a persona, building its system prompt
    #[must_use]
    pub fn for_persona(documents: &PersonaDocuments) -> Self {
        Self::new(build_system_prompt(&documents.persona, &documents.facts))
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub const fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub(crate) const fn log_mut(&mut self) -> &mut ConversationLog {
        &mut self.log
    }

    /// Recorder generation; changes after every consumed clip
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) const fn bump_generation(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn set_pending_audio(&mut self, audio: SynthesizedAudio) {
        self.pending_audio = Some(audio);
    }

    /// Whether reply audio is waiting to be played
    #[must_use]
    pub const fn has_pending_audio(&self) -> bool {
        self.pending_audio.is_some()
    }

    /// Take the reply audio for playback; later calls return `None`
    pub const fn take_audio(&mut self) -> Option<SynthesizedAudio> {
        self.pending_audio.take()
    }
}
