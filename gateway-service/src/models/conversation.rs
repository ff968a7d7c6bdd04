//! Conversation history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a persisted conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One message in a conversation, persisted append-only.
///
/// Turns are grouped into sessions by `session_id`; ordering is by creation
/// time. The gateway never mutates or deletes turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub client_id: String,
    pub session_id: String,
    pub role: TurnRole,
    pub content: String,
    /// Set by the repository on insert; present when reading back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A prompt message in the upstream completion API's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}
