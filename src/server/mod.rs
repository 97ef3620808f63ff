//! HTTP backend for the web chat client
//!
//! Exposes the chat, model listing, reset and defaults routes. Conversation
//! state lives server side, keyed by a session cookie.

pub mod handlers;
pub mod session;

use crate::chat::ChatOrchestrator;
use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::providers::{CompletionEndpoint, OpenAiEndpoint};
use crate::session::SessionStore;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;

/// Largest accepted request body; chat bodies carry base64 images
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatOrchestrator>,
    pub sessions: Arc<SessionStore>,
    pub cookie_name: Arc<str>,
}

impl AppState {
    /// Build the server state around a completion endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the chat configuration is invalid
    pub fn new(config: &Config, endpoint: Arc<dyn CompletionEndpoint>) -> Result<Self> {
        Ok(Self {
            chat: Arc::new(ChatOrchestrator::new(endpoint, config)?),
            sessions: Arc::new(SessionStore::new(config.server.session_ttl_seconds)),
            cookie_name: Arc::from(config.server.cookie_name.as_str()),
        })
    }
}

/// Error response with a JSON `{"error": ...}` body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Client error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        let status = match error.downcast_ref::<ParleyError>() {
            Some(ParleyError::EmptyInput) | Some(ParleyError::InvalidRequest(_)) => {
                StatusCode::BAD_REQUEST
            }
            Some(ParleyError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {:#}", error);
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/models", get(handlers::models))
        .route("/api/reset", post(handlers::reset))
        .route("/api/defaults", get(handlers::defaults))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Run the server until Ctrl-C
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails
pub async fn serve(config: &Config) -> Result<()> {
    let endpoint = OpenAiEndpoint::new(Duration::from_secs(config.upstream.timeout_seconds))?;
    let state = AppState::new(config, Arc::new(endpoint))?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ParleyError::Config(format!("Failed to bind {}: {}", address, e)))?;

    tracing::info!(
        "Listening on http://{} (default model {} at {})",
        address,
        config.upstream.model,
        config.upstream.base_url
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
