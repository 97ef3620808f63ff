//! Route handlers

use crate::catalog;
use crate::chat::ChatRequest;
use crate::server::session::Session;
use crate::server::{ApiError, AppState};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// `POST /api/chat`
///
/// The body is read as JSON regardless of its content type. The session is
/// saved whatever the outcome, since a failed turn still records the user
/// message, unless it is a new session the request never touched.
pub async fn chat(State(app): State<AppState>, mut session: Session, body: Bytes) -> Response {
    let result = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => match ChatRequest::from_json(&value) {
            Ok(request) => app
                .chat
                .send(&mut session.state, request)
                .await
                .map_err(ApiError::from),
            Err(e) => Err(ApiError::from(e)),
        },
        Err(e) => Err(ApiError::bad_request(format!("Invalid JSON body: {}", e))),
    };

    if let Err(e) = &result {
        tracing::warn!("Chat request failed with {}: {}", e.status, e.message);
    }

    let cookie = match session.persist(&app) {
        Ok(cookie) => cookie,
        Err(e) => return e.into_response(),
    };

    let response = match result {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => e.into_response(),
    };
    with_cookie(response, cookie)
}

fn with_cookie(mut response: Response, cookie: Option<(HeaderName, HeaderValue)>) -> Response {
    if let Some((name, value)) = cookie {
        response.headers_mut().insert(name, value);
    }
    response
}

/// Query of `GET /api/models`
#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// `GET /api/models`
pub async fn models(
    State(app): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let base_url = non_blank(&query.base_url);
    let api_key = non_blank(&query.api_key);
    let connection = app.chat.connection(base_url.as_deref(), api_key.as_deref());

    let models = catalog::list_models(app.chat.endpoint().as_ref(), &connection)
        .await
        .map_err(|e| {
            tracing::warn!("Model listing from {} failed: {}", connection.base_url, e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({ "models": models })))
}

/// `POST /api/reset`
pub async fn reset(
    State(app): State<AppState>,
    mut session: Session,
) -> Result<Response, ApiError> {
    session.state.reset();
    let cookie = session.persist(&app)?;
    tracing::info!("Session {} reset", session.id);
    Ok(with_cookie(Json(json!({ "ok": true })).into_response(), cookie))
}

/// `GET /api/defaults`
pub async fn defaults(State(app): State<AppState>) -> Json<serde_json::Value> {
    let defaults = app.chat.defaults();
    Json(json!({
        "default_base_url": defaults.base_url,
        "default_model": defaults.model,
    }))
}

/// Fallback status for unknown routes
pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
