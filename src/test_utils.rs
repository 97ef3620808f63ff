//! Test utilities for Parley
//!
//! Provides a scriptable in-process `CompletionEndpoint` so the chat
//! orchestrator, the model catalog and the HTTP server can be exercised
//! without a network.

use crate::error::{ParleyError, Result};
use crate::providers::{
    ChatCompletionRequest, Choice, ChoiceMessage, CompletionEndpoint, CompletionResponse,
    Connection,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Completion endpoint that replays scripted responses
///
/// Every `complete` call is recorded, including failing ones. When the script
/// runs out the endpoint answers with an empty completion.
///
/// # Examples
///
/// ```
/// use parley::providers::{ChatCompletionRequest, CompletionEndpoint, Connection, Message};
/// use parley::test_utils::FakeEndpoint;
///
/// # #[tokio::main]
/// # async fn main() {
/// let endpoint = FakeEndpoint::new().with_reply("Hi!", None);
/// let request = ChatCompletionRequest {
///     model: "m".to_string(),
///     messages: vec![Message::user("Hello")],
///     temperature: 0.7,
///     max_tokens: None,
/// };
/// let response = endpoint
///     .complete(&Connection::new("http://localhost:1234/v1", "k"), &request)
///     .await
///     .unwrap();
/// assert_eq!(response.first_content(), "Hi!");
/// assert_eq!(endpoint.requests().len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FakeEndpoint {
    replies: Mutex<VecDeque<CompletionResponse>>,
    models: serde_json::Value,
    failure: Option<String>,
    requests: Mutex<Vec<(Connection, ChatCompletionRequest)>>,
    model_calls: Mutex<Vec<Connection>>,
}

impl FakeEndpoint {
    /// Create an endpoint with no scripted replies and an empty model list
    pub fn new() -> Self {
        Self {
            models: serde_json::json!({ "data": [] }),
            ..Self::default()
        }
    }

    /// Queue a reply with the given content and raw usage payload
    pub fn with_reply(self, content: &str, usage: Option<serde_json::Value>) -> Self {
        self.with_response(CompletionResponse {
            choices: vec![Choice {
                message: Some(ChoiceMessage {
                    content: Some(content.to_string()),
                }),
            }],
            usage,
        })
    }

    /// Queue a full completion response
    pub fn with_response(self, response: CompletionResponse) -> Self {
        self.replies
            .lock()
            .expect("fake endpoint lock poisoned")
            .push_back(response);
        self
    }

    /// Set the payload returned by `list_models`
    pub fn with_models(mut self, models: serde_json::Value) -> Self {
        self.models = models;
        self
    }

    /// Make every call fail with an upstream error carrying `message`
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Completion requests received so far
    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests
            .lock()
            .expect("fake endpoint lock poisoned")
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Connections used by completion requests so far
    pub fn connections(&self) -> Vec<Connection> {
        self.requests
            .lock()
            .expect("fake endpoint lock poisoned")
            .iter()
            .map(|(connection, _)| connection.clone())
            .collect()
    }

    /// Connections used by model listing calls so far
    pub fn model_calls(&self) -> Vec<Connection> {
        self.model_calls
            .lock()
            .expect("fake endpoint lock poisoned")
            .clone()
    }
}

#[async_trait]
impl CompletionEndpoint for FakeEndpoint {
    async fn complete(
        &self,
        connection: &Connection,
        request: &ChatCompletionRequest,
    ) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .expect("fake endpoint lock poisoned")
            .push((connection.clone(), request.clone()));

        if let Some(message) = &self.failure {
            return Err(ParleyError::Upstream(message.clone()).into());
        }

        Ok(self
            .replies
            .lock()
            .expect("fake endpoint lock poisoned")
            .pop_front()
            .unwrap_or_default())
    }

    async fn list_models(&self, connection: &Connection) -> Result<serde_json::Value> {
        self.model_calls
            .lock()
            .expect("fake endpoint lock poisoned")
            .push(connection.clone());

        if let Some(message) = &self.failure {
            return Err(ParleyError::Upstream(message.clone()).into());
        }
        Ok(self.models.clone())
    }
}
