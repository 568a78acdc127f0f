use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityState;
use crate::ids::MessageId;

/// Shown in place of the answer when the channel fails before any text arrived.
pub const CHANNEL_FAILURE_NOTICE: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// Shown when the channel could not even be opened.
pub const SETUP_FAILURE_NOTICE: &str =
    "Sorry, there was an error connecting to the server. Please check your connection and try again.";

pub const DEFAULT_GREETING: &str = "Hi there, how can I help you?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Assistant,
}

/// One entry in the conversation timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub content: String,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityState>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            author: Author::User,
            content: text.into(),
            loading: false,
            activity: None,
            created_at: Utc::now(),
        }
    }

    /// Empty assistant message waiting for the stream.
    pub fn assistant_placeholder(id: MessageId) -> Self {
        Self {
            id,
            author: Author::Assistant,
            content: String::new(),
            loading: true,
            activity: None,
            created_at: Utc::now(),
        }
    }

    /// Settled assistant text, e.g. the session greeting.
    pub fn assistant_text(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            loading: false,
            content: text.into(),
            ..Self::assistant_placeholder(id)
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }
}
