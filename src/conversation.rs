//! Append-only conversation log

use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Ordered turns, starting with exactly one system turn
///
/// Turns can only be appended. The full sequence is what the language
/// model sees as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// Start a log with the given system prompt
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::System,
                content: system_prompt.into(),
            }],
        }
    }

    /// Append a user turn
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Role::User, text.into());
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(Role::Assistant, text.into());
    }

    fn push(&mut self, role: Role, content: String) {
        self.turns.push(Turn { role, content });
    }

    /// All turns, system turn first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns after the system turn
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.turns[1..]
    }

    /// The system prompt this log was started with
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.turns[0].content
    }

    /// Number of turns, including the system turn
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: a log holds at least its system turn
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Index of the most recent assistant turn, if any
    ///
    /// Only used to emphasize the latest reply when rendering.
    #[must_use]
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.turns.iter().rposition(|t| t.role == Role::Assistant)
    }
}
