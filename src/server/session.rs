//! Cookie-backed session extractor

use crate::server::{ApiError, AppState};
use crate::session::SessionState;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// The caller's session, loaded from the session store
///
/// A request without a valid cookie gets a fresh session. Handlers mutate
/// `state` and call `persist` before responding.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub is_new: bool,
}

impl Session {
    /// Persist the session state
    pub fn save(&self, app: &AppState) -> Result<(), ApiError> {
        app.sessions.save(&self.id, &self.state)?;
        Ok(())
    }

    /// Save the session and return its cookie header
    ///
    /// A new session that is still empty is neither stored nor issued a
    /// cookie, so rejected cookieless requests leave no state behind.
    pub fn persist(&self, app: &AppState) -> Result<Option<(HeaderName, HeaderValue)>, ApiError> {
        if self.is_new && self.state.is_empty() {
            tracing::debug!("Not storing untouched session {}", self.id);
            return Ok(None);
        }
        self.save(app)?;
        self.cookie(app).map(Some)
    }

    /// `Set-Cookie` header refreshing the session cookie
    pub fn cookie(&self, app: &AppState) -> Result<(HeaderName, HeaderValue), ApiError> {
        let value = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            app.cookie_name,
            self.id,
            app.sessions.ttl_seconds()
        );
        let value = HeaderValue::from_str(&value)
            .map_err(|e| ApiError::internal(format!("Invalid session cookie: {}", e)))?;
        Ok((SET_COOKIE, value))
    }
}

/// Value of the named cookie, if the request carries it
///
/// # Examples
///
/// ```
/// use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
/// use parley::server::session::read_cookie;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(COOKIE, HeaderValue::from_static("theme=dark; parley_session=abc123"));
/// assert_eq!(read_cookie(&headers, "parley_session").as_deref(), Some("abc123"));
/// assert_eq!(read_cookie(&headers, "other"), None);
/// ```
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        app: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie = read_cookie(&parts.headers, &app.cookie_name);
        let (id, state, is_new) = app.sessions.load_or_create(cookie.as_deref())?;
        if is_new {
            tracing::debug!("Issuing new session {}", id);
        }
        Ok(Self { id, state, is_new })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("parley_session=xyz"));
        assert_eq!(
            read_cookie(&headers, "parley_session").as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn test_read_cookie_ignores_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("parley_session="));
        assert_eq!(read_cookie(&headers, "parley_session"), None);
    }

    #[test]
    fn test_read_cookie_requires_exact_name() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("xparley_session=1"));
        assert_eq!(read_cookie(&headers, "parley_session"), None);
    }
}
