pub mod openai;

use serde::{Deserialize, Serialize};

/// The two roles the completion endpoint understands.
///
/// Stored rows may carry other labels (older databases used `bot` for model
/// turns); anything outside this set maps to `Assistant` when read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Maps a stored label onto the closed role set.
    pub fn from_label(label: &str) -> Self {
        match label {
            "user" => Role::User,
            _ => Role::Assistant,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One call against the completion endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// How a streaming completion finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The upstream stream ran to its end; holds the accumulated text.
    Completed(String),
    /// The token callback declined a fragment; the rest of the upstream
    /// stream was abandoned and partial content discarded.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_labels() {
        assert_eq!(Role::from_label("user"), Role::User);
        assert_eq!(Role::from_label("assistant"), Role::Assistant);
    }

    #[test]
    fn test_unknown_labels_map_to_assistant() {
        assert_eq!(Role::from_label("bot"), Role::Assistant);
        assert_eq!(Role::from_label("system"), Role::Assistant);
        assert_eq!(Role::from_label(""), Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
