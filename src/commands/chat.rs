//! One-shot chat from the terminal
//!
//! Uses the stored settings as the request overrides and keeps the
//! conversation in the local store, so consecutive invocations continue the
//! same conversation until `--reset` (history only) or `--new` (history and
//! token totals).

use crate::chat::{ChatOrchestrator, ChatReply, ChatRequest, ImageAttachment};
use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::providers::{CompletionEndpoint, OpenAiEndpoint};
use crate::session::SessionState;
use crate::settings::{Settings, SettingsStore};
use crate::storage::LocalStore;
use base64::Engine;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Local store key holding the terminal conversation
pub const CLI_SESSION_KEY: &str = "cliSession";

/// Run a chat turn and print the reply
pub async fn run_chat(
    config: &Config,
    message: String,
    image: Option<PathBuf>,
    detail: Option<String>,
    reset: bool,
    new: bool,
) -> Result<()> {
    let store = super::open_store(config)?;
    if new {
        reset_conversation(&store)?;
    }
    let endpoint = OpenAiEndpoint::new(Duration::from_secs(config.upstream.timeout_seconds))?;
    let attachment = image
        .as_deref()
        .map(|path| load_image(path, detail))
        .transpose()?;

    let reply = send_turn(
        &store,
        Arc::new(endpoint),
        config,
        ChatRequest {
            image: attachment,
            reset,
            ..ChatRequest::new(message)
        },
    )
    .await?;

    println!("{}", reply.reply);
    println!();
    let mut footer = format!("{} ms", reply.latency_ms);
    if let Some(total) = reply.usage.total_tokens {
        footer.push_str(&format!(", {} tokens", total));
    }
    if let Some(totals) = reply.session_totals {
        footer.push_str(&format!(", {} tokens this conversation", totals.total_tokens));
    }
    println!("{}", footer.dimmed());
    Ok(())
}

/// Send one turn using the stored settings and conversation
///
/// Connection and generation fields of `request` are filled from the stored
/// settings. The conversation is saved back whatever the outcome, so a failed
/// turn keeps the user message.
pub async fn send_turn(
    store: &dyn LocalStore,
    endpoint: Arc<dyn CompletionEndpoint>,
    config: &Config,
    request: ChatRequest,
) -> Result<ChatReply> {
    let settings = SettingsStore::new(store, Settings::defaults(config)).load()?;
    let orchestrator = ChatOrchestrator::new(endpoint, config)?;

    let mut state = load_conversation(store)?;
    let request = apply_settings(request, &settings);
    let result = orchestrator.send(&mut state, request).await;
    store.set_json(CLI_SESSION_KEY, &state.to_value())?;
    result
}

/// Stored terminal conversation, repaired if needed
pub fn load_conversation(store: &dyn LocalStore) -> Result<SessionState> {
    match store.get_json(CLI_SESSION_KEY)? {
        Some(document) => {
            let (state, migrated) = SessionState::from_value(&document);
            if migrated {
                tracing::info!("Repaired stored terminal conversation");
                store.set_json(CLI_SESSION_KEY, &state.to_value())?;
            }
            Ok(state)
        }
        None => Ok(SessionState::new()),
    }
}

/// Clear the stored terminal conversation, including its token totals
pub fn reset_conversation(store: &dyn LocalStore) -> Result<()> {
    let mut state = load_conversation(store)?;
    state.reset();
    store.set_json(CLI_SESSION_KEY, &state.to_value())?;
    tracing::info!("Started a new terminal conversation");
    Ok(())
}

fn apply_settings(request: ChatRequest, settings: &Settings) -> ChatRequest {
    let image = request.image.map(|image| ImageAttachment {
        detail: image
            .detail
            .or_else(|| Some(settings.image_detail.as_str().to_string())),
        ..image
    });
    ChatRequest {
        image,
        base_url: request.base_url.or_else(|| Some(settings.base_url.clone())),
        api_key: request.api_key.or_else(|| Some(settings.api_key.clone())),
        model: request.model.or_else(|| Some(settings.model_id.clone())),
        system_prompt: request
            .system_prompt
            .or_else(|| Some(settings.system_prompt.clone())),
        temperature: request.temperature.or(Some(settings.temperature)),
        max_tokens: request.max_tokens.or(settings.max_tokens),
        ..request
    }
}

/// MIME type of an image file, from its extension
///
/// # Examples
///
/// ```
/// use parley::commands::chat::image_mime_type;
/// use std::path::Path;
///
/// assert_eq!(image_mime_type(Path::new("cat.JPG")), Some("image/jpeg"));
/// assert_eq!(image_mime_type(Path::new("notes.txt")), None);
/// ```
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Read an image file into a base64 `data:` URL attachment
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a supported image
pub fn load_image(path: &Path, detail: Option<String>) -> Result<ImageAttachment> {
    let mime_type = image_mime_type(path).ok_or_else(|| {
        ParleyError::InvalidRequest(format!("Unsupported image type: {}", path.display()))
    })?;
    let bytes = std::fs::read(path)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

    tracing::debug!("Attaching {} ({} bytes)", path.display(), bytes.len());
    Ok(ImageAttachment {
        data: format!("data:{};base64,{}", mime_type, encoded),
        name: path.file_name().map(|n| n.to_string_lossy().to_string()),
        mime_type: Some(mime_type.to_string()),
        detail,
    })
}
