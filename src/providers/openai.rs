//! OpenAI-compatible endpoint implementation for Parley
//!
//! Talks to any server exposing `POST /chat/completions` and `GET /models`
//! under a base URL (LM Studio, vLLM, llama.cpp server, OpenAI itself).

use crate::error::{ParleyError, Result};
use crate::providers::{ChatCompletionRequest, CompletionEndpoint, CompletionResponse, Connection};

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// HTTP client for OpenAI-compatible endpoints
///
/// # Examples
///
/// ```no_run
/// use parley::providers::{ChatCompletionRequest, CompletionEndpoint, Connection, Message, OpenAiEndpoint};
/// use std::time::Duration;
///
/// # async fn example() -> parley::error::Result<()> {
/// let endpoint = OpenAiEndpoint::new(Duration::from_secs(120))?;
/// let connection = Connection::new("http://localhost:1234/v1", "lm-studio");
/// let request = ChatCompletionRequest {
///     model: "qwen/qwen3-30b-a3b-2507".to_string(),
///     messages: vec![Message::user("Hello!")],
///     temperature: 0.7,
///     max_tokens: None,
/// };
/// let response = endpoint.complete(&connection, &request).await?;
/// println!("{}", response.first_content());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiEndpoint {
    client: Client,
}

impl OpenAiEndpoint {
    /// Create a new endpoint client
    ///
    /// # Arguments
    ///
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized OpenAI-compatible endpoint client: timeout={:?}", timeout);

        Ok(Self { client })
    }
}

/// Turn a non-success response body into the upstream error text
///
/// Prefers the `error.message` field of an OpenAI style error document.
fn format_endpoint_error(status: reqwest::StatusCode, body: &str) -> ParleyError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message").or(Some(error)))
                .and_then(|message| message.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.is_empty() {
        ParleyError::Upstream(format!("Endpoint returned error {}", status))
    } else {
        ParleyError::Upstream(format!("Endpoint returned error {}: {}", status, message))
    }
}

#[async_trait]
impl CompletionEndpoint for OpenAiEndpoint {
    async fn complete(
        &self,
        connection: &Connection,
        request: &ChatCompletionRequest,
    ) -> Result<CompletionResponse> {
        let url = super::endpoint_url(&connection.base_url, "chat/completions")?;

        tracing::debug!(
            "Sending chat completion: url={}, model={}, {} messages",
            url,
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&connection.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Chat completion request failed: {}", e);
                ParleyError::Upstream(format!("Connection error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Endpoint returned error {}: {}", status, error_text);
            return Err(format_endpoint_error(status, &error_text).into());
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse completion response: {}", e);
            ParleyError::Upstream(format!("Failed to parse completion response: {}", e))
        })?;

        tracing::debug!(
            "Chat completion received: {} choices",
            completion.choices.len()
        );

        Ok(completion)
    }

    async fn list_models(&self, connection: &Connection) -> Result<serde_json::Value> {
        let url = super::endpoint_url(&connection.base_url, "models")?;
        tracing::debug!("Fetching models from {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&connection.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch models: {}", e);
                ParleyError::Upstream(format!("Connection error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Endpoint returned error {}: {}", status, error_text);
            return Err(format_endpoint_error(status, &error_text).into());
        }

        let payload = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse model listing: {}", e);
            ParleyError::Upstream(format!("Failed to parse model listing: {}", e))
        })?;

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_creation() {
        assert!(OpenAiEndpoint::new(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_format_endpoint_error_prefers_error_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let error = format_endpoint_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert_eq!(
            error.to_string(),
            "Endpoint returned error 401 Unauthorized: Incorrect API key provided"
        );
    }

    #[test]
    fn test_format_endpoint_error_string_error_field() {
        let body = r#"{"error":"No models loaded"}"#;
        let error = format_endpoint_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().ends_with("No models loaded"));
    }

    #[test]
    fn test_format_endpoint_error_plain_body() {
        let error = format_endpoint_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(
            error.to_string(),
            "Endpoint returned error 502 Bad Gateway: upstream down"
        );
    }

    #[test]
    fn test_format_endpoint_error_empty_body() {
        let error = format_endpoint_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(
            error.to_string(),
            "Endpoint returned error 500 Internal Server Error"
        );
    }
}
