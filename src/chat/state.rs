//! Conversation state machine — tracks which phase the session is in.

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, Role};

/// The phases of a chat session.
///
/// Collecting is initial. The only transition is Collecting → Answering,
/// fired when the profile is confirmed with no missing fields. It is
/// one-way: once a session answers questions, collection never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    Collecting,
    Answering,
}

impl ChatPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ChatPhase) -> bool {
        matches!((self, target), (Self::Collecting, Self::Answering))
    }
}

impl Default for ChatPhase {
    fn default() -> Self {
        Self::Collecting
    }
}

impl std::fmt::Display for ChatPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Collecting => "collecting",
            Self::Answering => "answering",
        };
        write!(f, "{s}")
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of the conversation, ordered by occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    /// Map to a completion-request message.
    pub fn to_chat_message(&self) -> ChatMessage {
        let role = match self.role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        };
        ChatMessage {
            role,
            content: self.content.clone(),
        }
    }
}
