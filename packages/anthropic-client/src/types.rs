//! Anthropic Messages API request and response types.

use serde::{Deserialize, Serialize};

// =============================================================================
// Messages
// =============================================================================

/// Messages API request.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model to use (e.g., "claude-3-haiku-20240307")
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl MessagesRequest {
    /// Create a new request with the given model and token limit.
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: Vec::new(),
            system: None,
            temperature: None,
        }
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the system prompt.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "user" or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Messages API response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    /// Generated content blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    /// Model that produced the response
    pub model: String,

    /// Why generation stopped ("end_turn", "max_tokens", ...)
    #[serde(default)]
    pub stop_reason: Option<String>,

    /// Token usage statistics
    pub usage: Usage,
}

impl MessagesResponse {
    /// Concatenated text of all text content blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unknown => None,
            })
            .collect()
    }
}

/// One content block of a response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text output
    Text { text: String },

    /// Any block type this client does not model
    #[serde(other)]
    Unknown,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub input_tokens: u32,

    /// Tokens in the completion
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let user = Message::user("Hallo");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "Hallo");

        let assistant = Message::assistant("Hi");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_messages_request_builder() {
        let req = MessagesRequest::new("claude-3-haiku-20240307", 2000)
            .message(Message::user("Hallo"))
            .temperature(0.7);

        assert_eq!(req.model, "claude-3-haiku-20240307");
        assert_eq!(req.max_tokens, 2000);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.temperature, Some(0.7));
    }

    #[test]
    fn test_messages_request_skips_unset_fields() {
        let req = MessagesRequest::new("claude-3-haiku-20240307", 100)
            .message(Message::user("Hallo"));
        let json = serde_json::to_value(&req).unwrap();

        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn test_messages_response_text() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "Hallo zusammen!"},
                {"type": "tool_use", "id": "t1", "name": "noop", "input": {}}
            ],
            "model": "claude-3-haiku-20240307",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 42, "output_tokens": 7}
        }"#;
        let response: MessagesResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(response.text(), "Hallo zusammen!");
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.input_tokens, 42);
    }
}
