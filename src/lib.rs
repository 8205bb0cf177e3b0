//! Persona Voice - spoken conversation with a persona-grounded assistant
//!
//! Each turn takes one recorded clip through three remote providers:
//! speech-to-text, a chat completion model and text-to-speech. The reply
//! is shown as text and played once as audio.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Adapters                         │
//! │      HTTP page + JSON API   │   Terminal (talk)     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Turn Pipeline                      │
//! │   Session  │  Conversation Log  │  System Prompt    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Providers                         │
//! │   Whisper (STT)  │  Chat Completions  │  ElevenLabs │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod persona;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod setup;
pub mod voice;

pub use config::{Config, ConfigOverrides, SecretResolver, SecretSource, Secrets};
pub use conversation::{ConversationLog, Role, Turn};
pub use error::{Error, Result};
pub use persona::{FactSheet, Fingerprint, Persona, PersonaDocuments, PersonaStore};
pub use pipeline::{
    ChatModel, CompletionParams, PipelineState, Synthesizer, Transcriber, TurnOutcome,
    TurnPipeline,
};
pub use prompt::build_system_prompt;
pub use session::Session;
