//! Request and response models for the chat relay API.
//!
//! Inbound messages arrive in several shapes (flat `content`, OpenAI-style
//! content part arrays, UI-style `parts` arrays). They are captured here as
//! tagged variants and reduced to [`ChatMessage`] by
//! [`crate::services::message_normalizer`].

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

/// Conversation role of a message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl Role {
    /// Parse a role name, case-insensitively. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One normalized conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Normalized unit of work submitted upstream.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// One incremental piece of upstream output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub data: String,
    pub is_final: bool,
}

impl StreamChunk {
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            is_final: false,
        }
    }

    /// Terminal marker carrying no text.
    pub fn finished() -> Self {
        Self {
            data: String::new(),
            is_final: true,
        }
    }
}

/// A message as the client sent it.
///
/// Every field is optional; anything that does not fit the expected shape
/// deserializes to an "ignored" variant instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub role: Option<InboundRole>,

    #[serde(default)]
    pub content: Option<InboundContent>,

    #[serde(default)]
    pub parts: Option<InboundParts>,
}

/// Role field: a string, or anything else.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundRole {
    Name(String),
    Invalid(IgnoredAny),
}

/// `content` field: flat text, an array of typed parts, or something else.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundContent {
    Text(String),
    Parts(Vec<InboundPart>),
    Invalid(IgnoredAny),
}

/// `parts` field: an array of typed parts, or something else.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundParts {
    List(Vec<InboundPart>),
    Invalid(IgnoredAny),
}

impl InboundParts {
    /// The parts array, if the field held one.
    pub fn as_list(&self) -> Option<&[InboundPart]> {
        match self {
            InboundParts::List(parts) => Some(parts),
            InboundParts::Invalid(_) => None,
        }
    }
}

/// One element of a parts array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundPart {
    Typed(TypedPart),
    Invalid(IgnoredAny),
}

/// Parts carrying a `type` tag. Only text parts are relayed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedPart {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl InboundPart {
    /// Text of this part if it is tagged `text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InboundPart::Typed(TypedPart::Text { text }) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
