//! Chat session and message models.

use std::fmt;

use mergedesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum length of a session title derived from the opening message.
pub const SESSION_TITLE_MAX_CHARS: usize = 60;

/// A conversation owned by a user.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatSession {
    pub id: DbId,
    pub user_id: DbId,
    pub title: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Build a session title from the first line of a message.
///
/// Returns `None` when the message has no visible text.
pub fn session_title_from(message: &str) -> Option<String> {
    let first_line = message.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut title: String = first_line.chars().take(SESSION_TITLE_MAX_CHARS).collect();
    if first_line.chars().count() > SESSION_TITLE_MAX_CHARS {
        title.push('…');
    }
    Some(title)
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single persisted chat message.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatMessage {
    pub id: DbId,
    pub session_id: DbId,
    pub role: String,
    pub content: String,
    pub message_metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for appending a message to a session.
#[derive(Debug)]
pub struct CreateChatMessage {
    pub session_id: DbId,
    pub role: MessageRole,
    pub content: String,
    pub message_metadata: Option<serde_json::Value>,
}
