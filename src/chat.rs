//! Chat orchestration
//!
//! Turns one user message plus per-request overrides into a completion call:
//! the outbound list is the optional system prompt, the session history and
//! the new user turn. The user turn is recorded before the call so it
//! survives an upstream failure; the assistant turn and usage are recorded
//! only on success.

use crate::config::{Config, UpstreamConfig};
use crate::error::{ParleyError, Result};
use crate::providers::{
    ChatCompletionRequest, CompletionEndpoint, Connection, ContentPart, ImageDetail, Message,
    MessageContent, Role,
};
use crate::session::usage::normalize_usage;
use crate::session::{SessionState, UsageReport, UsageTotals};
use crate::settings::{coerce_max_tokens, parse_temperature};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Image attached to a chat request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAttachment {
    /// Image location, usually a `data:` URL
    pub data: String,
    /// Original file name, informational only
    pub name: Option<String>,
    /// MIME type, informational only
    pub mime_type: Option<String>,
    /// Requested detail level as supplied by the client
    pub detail: Option<String>,
}

/// One chat turn with its overrides
///
/// Unset connection fields fall back to the configured upstream defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub image: Option<ImageAttachment>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Clear the history before this turn
    pub reset: bool,
}

impl ChatRequest {
    /// Create a request carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Decode the JSON body of `POST /api/chat`
    ///
    /// Fields are read leniently: wrong types and blank strings count as
    /// absent, temperature and max tokens are coerced, and `reset` follows
    /// JSON truthiness.
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::InvalidRequest` when the body is not an object
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::chat::ChatRequest;
    /// use serde_json::json;
    ///
    /// let request = ChatRequest::from_json(&json!({
    ///     "message": "Hello",
    ///     "model": "",
    ///     "temperature": "0.2",
    ///     "max_tokens": "",
    ///     "reset": 1
    /// }))
    /// .unwrap();
    /// assert_eq!(request.model, None);
    /// assert_eq!(request.temperature, Some(0.2));
    /// assert_eq!(request.max_tokens, None);
    /// assert!(request.reset);
    /// ```
    pub fn from_json(body: &Value) -> Result<Self> {
        let Some(fields) = body.as_object() else {
            return Err(
                ParleyError::InvalidRequest("Request body must be a JSON object".to_string())
                    .into(),
            );
        };

        let text = |key: &str| -> Option<String> {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let image = text("image_data").map(|data| ImageAttachment {
            data,
            name: text("image_name"),
            mime_type: text("image_type"),
            detail: fields
                .get("image_detail")
                .and_then(Value::as_str)
                .map(str::to_string),
        });

        Ok(Self {
            message: fields
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            base_url: text("base_url"),
            api_key: text("api_key"),
            model: text("model"),
            image,
            system_prompt: fields
                .get("system_prompt")
                .and_then(Value::as_str)
                .map(str::to_string),
            temperature: fields.get("temperature").and_then(parse_temperature),
            max_tokens: fields.get("max_tokens").and_then(coerce_max_tokens),
            reset: fields.get("reset").is_some_and(is_truthy),
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Result of a successful chat turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    /// Assistant text, empty when the endpoint returned none
    pub reply: String,
    /// Wall-clock duration of the endpoint call
    pub latency_ms: u64,
    /// Usable usage fields of this call, `{}` when none
    pub usage: UsageReport,
    /// Session totals, present only when this call reported usable usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_totals: Option<UsageTotals>,
}

/// Decides which models receive image attachments
#[derive(Debug, Clone)]
pub struct VisionMatcher {
    patterns: Vec<Regex>,
}

impl VisionMatcher {
    /// Compile case-insensitive model name patterns
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` when a pattern is not a valid regex
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ParleyError::Config(format!(
                            "Invalid vision model pattern {:?}: {}",
                            pattern, e
                        ))
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether a model accepts image input
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::chat::VisionMatcher;
    ///
    /// let matcher = VisionMatcher::new(&["magistral".to_string()]).unwrap();
    /// assert!(matcher.is_vision_model("Magistral-Small-2509"));
    /// assert!(!matcher.is_vision_model("qwen/qwen3-30b-a3b-2507"));
    /// assert!(!matcher.is_vision_model(""));
    /// ```
    pub fn is_vision_model(&self, model: &str) -> bool {
        !model.is_empty() && self.patterns.iter().any(|p| p.is_match(model))
    }
}

/// Assemble the outbound message list
///
/// The system message is included only for a non-empty prompt.
pub fn build_messages(
    system_prompt: &str,
    history: &[Message],
    user_turn: &Message,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !system_prompt.is_empty() {
        messages.push(Message::system(system_prompt));
    }
    messages.extend_from_slice(history);
    messages.push(user_turn.clone());
    messages
}

/// Drives chat turns against a completion endpoint
pub struct ChatOrchestrator {
    endpoint: Arc<dyn CompletionEndpoint>,
    defaults: UpstreamConfig,
    vision: VisionMatcher,
    default_temperature: f64,
}

impl ChatOrchestrator {
    /// Create an orchestrator using the configured upstream defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a vision model pattern does not compile
    pub fn new(endpoint: Arc<dyn CompletionEndpoint>, config: &Config) -> Result<Self> {
        Ok(Self {
            endpoint,
            defaults: config.upstream.clone(),
            vision: VisionMatcher::new(&config.chat.vision_model_patterns)?,
            default_temperature: config.chat.default_temperature,
        })
    }

    /// Endpoint used for completions and model listings
    pub fn endpoint(&self) -> &Arc<dyn CompletionEndpoint> {
        &self.endpoint
    }

    /// Upstream defaults used when a request carries no override
    pub fn defaults(&self) -> &UpstreamConfig {
        &self.defaults
    }

    /// Connection for optional per-request overrides
    pub fn connection(&self, base_url: Option<&str>, api_key: Option<&str>) -> Connection {
        Connection::new(
            base_url.unwrap_or(&self.defaults.base_url),
            api_key.unwrap_or(&self.defaults.api_key),
        )
    }

    /// Image and detail level that may be sent to `model`
    ///
    /// Images for models without vision support are dropped. An unknown or
    /// missing detail level defaults to `high`.
    pub fn resolve_image(
        &self,
        model: &str,
        image: Option<&ImageAttachment>,
    ) -> Option<(String, ImageDetail)> {
        let image = image?;
        let data = image.data.trim();
        if data.is_empty() {
            return None;
        }
        if !self.vision.is_vision_model(model) {
            tracing::debug!("Dropping image attachment for non-vision model {}", model);
            return None;
        }
        let detail = image
            .detail
            .as_deref()
            .and_then(ImageDetail::parse)
            .unwrap_or(ImageDetail::High);
        Some((data.to_string(), detail))
    }

    /// Run one chat turn against the session
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::EmptyInput` for a blank message, before any
    /// endpoint call, and `ParleyError::Upstream` when the endpoint fails. On
    /// failure the user turn stays in the history and usage is unchanged.
    pub async fn send(&self, state: &mut SessionState, request: ChatRequest) -> Result<ChatReply> {
        if request.reset {
            tracing::debug!("Clearing history before chat turn");
            state.clear_history();
        }

        let message = request.message.trim();
        if message.is_empty() {
            return Err(ParleyError::EmptyInput.into());
        }

        let model = request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.defaults.model)
            .to_string();

        let user_content = match self.resolve_image(&model, request.image.as_ref()) {
            Some((url, detail)) => {
                if let Some(image) = &request.image {
                    tracing::debug!(
                        "Attaching image {} ({}) with detail {:?}",
                        image.name.as_deref().unwrap_or("unnamed"),
                        image.mime_type.as_deref().unwrap_or("unknown type"),
                        detail
                    );
                }
                MessageContent::Parts(vec![
                    ContentPart::text(message),
                    ContentPart::image(url, Some(detail)),
                ])
            }
            None => MessageContent::Text(message.to_string()),
        };
        let user_turn = Message::user(user_content);

        let messages = build_messages(
            request.system_prompt.as_deref().unwrap_or_default(),
            state.history(),
            &user_turn,
        );
        state.append(Role::User, user_turn.content);

        let completion = ChatCompletionRequest {
            model,
            messages,
            temperature: request.temperature.unwrap_or(self.default_temperature),
            max_tokens: request.max_tokens.filter(|n| *n > 0),
        };
        let connection =
            self.connection(request.base_url.as_deref(), request.api_key.as_deref());

        tracing::info!(
            "Sending {} messages to {} at {}",
            completion.messages.len(),
            completion.model,
            connection.base_url
        );

        let started = Instant::now();
        let response = self
            .endpoint
            .complete(&connection, &completion)
            .await
            .map_err(|e| {
                tracing::error!("Completion failed: {}", e);
                match e.downcast::<ParleyError>() {
                    Ok(ParleyError::Upstream(text)) => ParleyError::Upstream(text),
                    Ok(other) => ParleyError::Upstream(other.to_string()),
                    Err(e) => ParleyError::Upstream(e.to_string()),
                }
            })?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let reply = response.first_content().to_string();
        state.append(Role::Assistant, reply.clone());

        let usage = normalize_usage(response.usage.as_ref()).unwrap_or_default();
        let session_totals = state.record_usage(response.usage.as_ref());

        tracing::debug!("Completion took {} ms", latency_ms);
        Ok(ChatReply {
            reply,
            latency_ms,
            usage,
            session_totals,
        })
    }
}
