//! Reduce client-supplied messages to [`ChatMessage`]s.
//!
//! Individual messages never fail: an unreadable role becomes `user` and an
//! unreadable body becomes empty content. Only the top-level `messages` value
//! can make a request invalid.

use crate::api::models::{
    ChatMessage, InboundContent, InboundMessage, InboundPart, InboundRole, Role,
};
use crate::core::error::ValidationError;
use serde::Deserialize;
use serde_json::Value;

/// Normalize the raw `messages` value of a chat request.
///
/// Returns [`ValidationError::InvalidMessages`] when the value is absent or not
/// an array. An empty array is returned as-is; emptiness is checked by the
/// caller.
pub fn normalize_messages(messages: Option<&Value>) -> Result<Vec<ChatMessage>, ValidationError> {
    let items = messages
        .and_then(Value::as_array)
        .ok_or(ValidationError::InvalidMessages)?;

    Ok(items.iter().map(normalize_value).collect())
}

/// Normalize one message-like value.
pub fn normalize_value(value: &Value) -> ChatMessage {
    let inbound = InboundMessage::deserialize_lenient(value);
    normalize_message(&inbound)
}

/// Normalize an already-deserialized inbound message.
pub fn normalize_message(message: &InboundMessage) -> ChatMessage {
    let role = match &message.role {
        Some(InboundRole::Name(name)) => Role::parse(name).unwrap_or_else(|| {
            tracing::debug!(role = %name, "Unknown message role, treating as user");
            Role::User
        }),
        _ => Role::User,
    };

    ChatMessage {
        role,
        content: extract_content(message),
    }
}

/// `parts` wins over `content`; within a parts list the first text part wins.
/// A `parts` value that is not an array counts as absent.
fn extract_content(message: &InboundMessage) -> String {
    if let Some(parts) = message.parts.as_ref().and_then(|p| p.as_list()) {
        return first_text(parts);
    }

    match &message.content {
        Some(InboundContent::Text(text)) => text.clone(),
        Some(InboundContent::Parts(parts)) => first_text(parts),
        Some(InboundContent::Invalid(_)) | None => String::new(),
    }
}

fn first_text(parts: &[InboundPart]) -> String {
    parts
        .iter()
        .find_map(InboundPart::as_text)
        .map(str::to_string)
        .unwrap_or_default()
}

impl InboundMessage {
    /// Deserialize, falling back to an empty message for non-object input.
    pub fn deserialize_lenient(value: &Value) -> Self {
        InboundMessage::deserialize(value).unwrap_or_default()
    }
}
