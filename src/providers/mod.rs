//! Endpoint module for Parley
//!
//! This module contains the completion endpoint abstraction, the chat
//! message model, and the OpenAI-compatible HTTP implementation.

pub mod base;
pub mod openai;

pub use base::{
    ChatCompletionRequest, Choice, ChoiceMessage, CompletionEndpoint, CompletionResponse,
    Connection, ContentPart, ImageDetail, ImageUrl, Message, MessageContent, Role,
};
pub use openai::OpenAiEndpoint;

use crate::error::{ParleyError, Result};
use url::Url;

/// Parse and check an endpoint base URL
///
/// Only `http` and `https` URLs are accepted.
///
/// # Examples
///
/// ```
/// use parley::providers::parse_base_url;
///
/// assert!(parse_base_url("http://localhost:1234/v1").is_ok());
/// assert!(parse_base_url("localhost:1234").is_err());
/// ```
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim()).map_err(ParleyError::from)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ParleyError::Config(format!(
            "Unsupported URL scheme {:?} in {}",
            other, base_url
        ))
        .into()),
    }
}

/// Build the URL of an API route under a base URL
///
/// The route is appended to the base path, so `http://host/v1` and
/// `http://host/v1/` both give `http://host/v1/models`.
///
/// # Errors
///
/// Returns `ParleyError::Upstream` when the base URL is invalid
///
/// # Examples
///
/// ```
/// use parley::providers::endpoint_url;
///
/// let url = endpoint_url("http://localhost:1234/v1/", "chat/completions").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:1234/v1/chat/completions");
/// ```
pub fn endpoint_url(base_url: &str, route: &str) -> Result<Url> {
    let base = parse_base_url(base_url)
        .map_err(|e| ParleyError::Upstream(format!("Invalid base URL: {}", e)))?;
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        route.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| ParleyError::Upstream(format!("Invalid endpoint URL {}: {}", joined, e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://example.com/v1").is_err());
        assert!(parse_base_url("https://api.openai.com/v1").is_ok());
    }

    #[test]
    fn test_endpoint_url_without_trailing_slash() {
        let url = endpoint_url("http://127.0.0.1:1234/v1", "models").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:1234/v1/models");
    }

    #[test]
    fn test_endpoint_url_host_only() {
        let url = endpoint_url("http://127.0.0.1:1234", "models").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:1234/models");
    }

    #[test]
    fn test_endpoint_url_invalid_base_is_upstream_error() {
        let err = endpoint_url("nope", "models").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParleyError>(),
            Some(ParleyError::Upstream(_))
        ));
    }
}
