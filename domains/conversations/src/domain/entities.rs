//! Domain entities for Conversations domain
//!
//! Threads and Messages as stored in the Remote Store, plus the insert
//! payloads the state manager hands to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_common::{Error, Result};
use parley_gateway::{ContextMessage, ContextRole};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<MessageRole> for ContextRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ContextRole::User,
            MessageRole::Assistant => ContextRole::Assistant,
        }
    }
}

/// Title given to threads created from the thread list
pub const DEFAULT_THREAD_TITLE: &str = "New Chat";

/// Maximum title string length
const MAX_TITLE_LENGTH: usize = 200;

/// Thread entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    /// Create a new thread with a client-generated id
    pub fn new(user_id: Uuid, title: Option<String>) -> Result<Self> {
        Self::validate_title(title.as_deref())?;

        Ok(Thread {
            id: Uuid::new_v4(),
            user_id,
            title,
            created_at: Utc::now(),
        })
    }

    /// Title for display, `"Untitled"` when absent or empty
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => "Untitled",
        }
    }

    /// Validate title (optional, at most 200 characters)
    pub fn validate_title(title: Option<&str>) -> Result<()> {
        if let Some(t) = title {
            if t.chars().count() > MAX_TITLE_LENGTH {
                return Err(Error::Validation(format!(
                    "Title must be at most {} characters",
                    MAX_TITLE_LENGTH
                )));
            }
        }
        Ok(())
    }
}

/// Message entity
///
/// Immutable once stored. `images` is session-only: it is never written to
/// the Remote Store and is attached to assistant replies on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: MessageRole,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl Message {
    /// Attach gateway images to an assistant reply
    pub fn with_images(mut self, images: Vec<String>) -> Result<Self> {
        if self.role != MessageRole::Assistant && !images.is_empty() {
            return Err(Error::Validation(
                "Images can only be attached to assistant messages".to_string(),
            ));
        }
        self.images = images;
        Ok(self)
    }

    /// The `{role, content}` pair resent to the gateway on every turn
    pub fn to_context(&self) -> ContextMessage {
        ContextMessage {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// Insert payload for a message; the store assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub thread_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: MessageRole,
    pub content: Option<String>,
}

impl NewMessage {
    /// Create a new user message
    pub fn user(thread_id: Uuid, user_id: Option<Uuid>, content: String) -> Result<Self> {
        Self::validate_content(&content)?;

        Ok(NewMessage {
            thread_id,
            user_id,
            role: MessageRole::User,
            content: Some(content),
        })
    }

    /// Create a new assistant message; assistant messages carry no user
    pub fn assistant(thread_id: Uuid, content: String) -> Self {
        NewMessage {
            thread_id,
            user_id: None,
            role: MessageRole::Assistant,
            content: Some(content),
        }
    }

    /// Validate message content (non-blank)
    fn validate_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::Validation(
                "Message content cannot be empty or whitespace-only".to_string(),
            ));
        }
        Ok(())
    }
}
