//! Base endpoint trait and common types for Parley
//!
//! This module defines the `CompletionEndpoint` trait implemented by the
//! OpenAI-compatible HTTP client, along with the chat message model shared
//! by the session history, the orchestrator and the wire format.

use crate::error::Result;
use async_trait::async_trait;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// End user
    User,
    /// Model reply
    Assistant,
}

impl Role {
    /// Parse a wire role name
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::Role;
    ///
    /// assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
    /// assert_eq!(Role::parse("tool"), None);
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image processing fidelity hint for vision models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    Auto,
    High,
}

impl ImageDetail {
    /// Parse a user supplied detail level
    ///
    /// Surrounding whitespace and case are ignored; unknown values yield `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::ImageDetail;
    ///
    /// assert_eq!(ImageDetail::parse(" HIGH "), Some(ImageDetail::High));
    /// assert_eq!(ImageDetail::parse("ultra"), None);
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "auto" => Some(Self::Auto),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Wire name of the detail level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Auto => "auto",
            Self::High => "high",
        }
    }
}

/// Image reference inside a content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Image location, usually a `data:` URL
    pub url: String,
    /// Optional detail level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ImageDetail>,
}

/// One element of a multi-part message
///
/// Parts other than text and images are kept verbatim in `Other` so they can
/// pass through storage unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// `{"type": "text", "text": ...}`
    Text { text: String },
    /// `{"type": "image_url", "image_url": {...}}`
    ImageUrl { image_url: ImageUrl },
    /// Any other JSON value
    Other(serde_json::Value),
}

impl ContentPart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part
    pub fn image(url: impl Into<String>, detail: Option<ImageDetail>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail,
            },
        }
    }

    /// Whether this part carries an image, including loosely shaped ones
    pub fn is_image(&self) -> bool {
        match self {
            Self::ImageUrl { .. } => true,
            Self::Other(value) => {
                value.get("type").and_then(|t| t.as_str()) == Some("image_url")
            }
            Self::Text { .. } => false,
        }
    }

    /// Typed variants are used only for parts with exactly their own keys;
    /// anything carrying extra fields stays `Other` so it round-trips intact.
    fn from_value(value: serde_json::Value) -> Self {
        let key_count = value.as_object().map_or(0, |object| object.len());
        match value.get("type").and_then(|t| t.as_str()) {
            Some("text") if key_count == 2 => {
                if let Some(text) = value.get("text").and_then(|t| t.as_str()) {
                    return Self::text(text);
                }
            }
            Some("image_url") if key_count == 2 => {
                if let Some(image_url) = value
                    .get("image_url")
                    .and_then(|v| serde_json::from_value::<ImageUrl>(v.clone()).ok())
                {
                    return Self::ImageUrl { image_url };
                }
            }
            _ => {}
        }
        Self::Other(value)
    }
}

impl Serialize for ContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Text { text } => {
                serde_json::json!({ "type": "text", "text": text }).serialize(serializer)
            }
            Self::ImageUrl { image_url } => {
                serde_json::json!({ "type": "image_url", "image_url": image_url })
                    .serialize(serializer)
            }
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

/// Message content: plain text or an ordered list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Plain text content, if this is not a part list
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    /// Whether any part carries an image
    pub fn has_image(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Parts(parts) => parts.iter().any(ContentPart::is_image),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(value: Vec<ContentPart>) -> Self {
        Self::Parts(value)
    }
}

/// Message structure for conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: MessageContent,
}

impl Message {
    /// Creates a message with the given role
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a new system message
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::{Message, Role};
    ///
    /// let msg = Message::system("Be terse.");
    /// assert_eq!(msg.role, Role::System);
    /// ```
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::{Message, Role};
    ///
    /// let msg = Message::user("Hello");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.content.as_text(), Some("Hello"));
    /// ```
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Connection target for the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Base URL including the API version prefix, e.g. `http://host:1234/v1`
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
}

impl Connection {
    /// Create a connection target
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// Body of a chat completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Full outbound message list
    pub messages: Vec<Message>,
    /// Sampling temperature
    pub temperature: f64,
    /// Completion token cap; omitted for no limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Assistant message inside a completion choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One completion choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

/// Completion response with choices and optional token usage
///
/// Usage is kept as raw JSON; the usage accumulator normalizes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
}

impl CompletionResponse {
    /// Content of the first choice, or an empty string when absent
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::CompletionResponse;
    ///
    /// let response: CompletionResponse = serde_json::from_str(
    ///     r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}}]}"#,
    /// ).unwrap();
    /// assert_eq!(response.first_content(), "Hi!");
    /// assert_eq!(CompletionResponse::default().first_content(), "");
    /// ```
    pub fn first_content(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .unwrap_or("")
    }
}

/// External OpenAI-compatible endpoint
///
/// Every call carries its own `Connection` since the base URL and key are
/// chosen per request by the client.
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    /// Run a chat completion
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Upstream` when the call fails or the response
    /// cannot be parsed
    async fn complete(
        &self,
        connection: &Connection,
        request: &ChatCompletionRequest,
    ) -> Result<CompletionResponse>;

    /// Fetch the raw model listing payload
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Upstream` when the call fails
    async fn list_models(&self, connection: &Connection) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_content_serializes_as_string() {
        let msg = Message::user("Hello");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "user", "content": "Hello"})
        );
    }

    #[test]
    fn test_image_part_serialization() {
        let msg = Message::user(vec![
            ContentPart::text("What is this?"),
            ContentPart::image("data:image/png;base64,AAAA", Some(ImageDetail::High)),
        ]);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "What is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA", "detail": "high"}}
                ]
            })
        );
    }

    #[test]
    fn test_image_detail_omitted_when_none() {
        let part = ContentPart::image("http://x/y.png", None);
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"type": "image_url", "image_url": {"url": "http://x/y.png"}})
        );
    }

    #[test]
    fn test_unknown_part_passes_through() {
        let raw = json!({"type": "input_audio", "input_audio": {"data": "..."}});
        let part: ContentPart = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(part, ContentPart::Other(raw.clone()));
        assert_eq!(serde_json::to_value(&part).unwrap(), raw);
    }

    #[test]
    fn test_loose_image_part_is_detected() {
        let part: ContentPart =
            serde_json::from_value(json!({"type": "image_url", "image_url": "http://x"})).unwrap();
        assert!(matches!(part, ContentPart::Other(_)));
        assert!(part.is_image());
    }

    #[test]
    fn test_message_content_deserialize_variants() {
        let text: MessageContent = serde_json::from_value(json!("hi")).unwrap();
        assert_eq!(text.as_text(), Some("hi"));

        let parts: MessageContent =
            serde_json::from_value(json!([{"type": "text", "text": "hi"}, 42])).unwrap();
        match parts {
            MessageContent::Parts(parts) => {
                assert_eq!(parts[0], ContentPart::text("hi"));
                assert_eq!(parts[1], ContentPart::Other(json!(42)));
            }
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn test_request_omits_max_tokens_when_unlimited() {
        let request = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![Message::user("x")],
            temperature: 0.7,
            max_tokens: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("max_tokens").is_none());
        assert_eq!(value["temperature"], json!(0.7));
    }

    #[test]
    fn test_completion_response_null_content() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}],
            "usage": {"prompt_tokens": 3}
        }))
        .unwrap();
        assert_eq!(response.first_content(), "");
        assert!(response.usage.is_some());
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }
}
