//! Conversation data model: roles, messages and the persisted session record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model stamped on records that were created without an explicit one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Speaker of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Parse a stored role string. Anything unrecognised is treated as `System`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::System,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn in a conversation, with content already flattened to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A typed block inside list-shaped message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub kind: String,
    pub text: Option<String>,
}

/// Message content as found on disk: either a plain string or a list of blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    PlainText(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Collapse content to plain text.
    ///
    /// Text blocks (kind `"text"`, or no kind at all) are concatenated in order.
    /// Other block kinds are dropped, and a text block with no `text` adds nothing.
    pub fn flatten(self) -> String {
        match self {
            Self::PlainText(text) => text,
            Self::Blocks(blocks) => blocks
                .into_iter()
                .filter(|block| block.kind.is_empty() || block.kind == "text")
                .filter_map(|block| block.text)
                .collect(),
        }
    }
}

/// Everything persisted for one session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Chronological turn order; never reordered.
    pub messages: Vec<Message>,
    pub model: String,
}

impl SessionRecord {
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_MODEL)
    }
}
