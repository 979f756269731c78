//! Assistant conversation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a locally authored message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
        }
    }
}

/// Conversation history held by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Request body for sending a message.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
}

/// The assistant's reply to a message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
}
