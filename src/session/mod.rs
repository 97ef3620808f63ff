//! Per-session conversation state
//!
//! A `SessionState` is an explicit record of one client's history and usage
//! totals. Handlers load it from the `SessionStore`, hand it to the chat
//! orchestrator by `&mut`, and save it back afterwards.

pub mod history;
pub mod store;
pub mod usage;

pub use history::{sanitize_content, sanitize_message, IMAGE_PLACEHOLDER};
pub use store::SessionStore;
pub use usage::{UsageReport, UsageSource, UsageTotals};

use crate::providers::{Message, MessageContent, Role};
use serde::Serialize;

/// History and usage totals of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage_totals: Option<UsageTotals>,
}

impl SessionState {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored session document
    ///
    /// Malformed history entries are dropped or repaired and image payloads
    /// are stripped; malformed usage totals are discarded. The second value
    /// reports whether the stored form differs from the clean one and should
    /// be written back.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::session::SessionState;
    /// use serde_json::json;
    ///
    /// let (state, migrated) = SessionState::from_value(&json!({
    ///     "history": ["junk", {"role": "user", "content": "Hello"}]
    /// }));
    /// assert!(migrated);
    /// assert_eq!(state.history().len(), 1);
    /// ```
    pub fn from_value(value: &serde_json::Value) -> (Self, bool) {
        let (history, mut migrated) = history::decode_history(value.get("history"));
        if !value.is_object() && !value.is_null() {
            tracing::warn!("Discarding stored session that is not an object");
            migrated = true;
        }

        let usage_totals = match value.get("usage_totals") {
            None | Some(serde_json::Value::Null) => None,
            Some(raw) => match serde_json::from_value::<UsageTotals>(raw.clone()) {
                Ok(totals) => Some(totals),
                Err(e) => {
                    tracing::warn!("Discarding malformed stored usage totals: {}", e);
                    migrated = true;
                    None
                }
            },
        };

        (
            Self {
                history,
                usage_totals,
            },
            migrated,
        )
    }

    /// Encode for storage
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!("Failed to encode session state: {}", e);
            serde_json::json!({ "history": [] })
        })
    }

    /// Whether there is neither history nor usage totals
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.usage_totals.is_none()
    }

    /// Current history in insertion order
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Sanitize and append a message
    pub fn append(&mut self, role: Role, content: impl Into<MessageContent>) {
        self.history.push(sanitize_message(Message::new(role, content)));
    }

    /// Clear the history, keeping usage totals
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Clear the history and drop the usage totals
    pub fn reset(&mut self) {
        self.history.clear();
        self.usage_totals = None;
    }

    /// Current usage totals, absent until the first usable usage report
    pub fn usage_totals(&self) -> Option<UsageTotals> {
        self.usage_totals
    }

    /// Add a usage report to the totals
    ///
    /// Returns the updated totals, or `None` when the report had nothing
    /// usable.
    pub fn record_usage<S: UsageSource + ?Sized>(
        &mut self,
        usage: Option<&S>,
    ) -> Option<UsageTotals> {
        usage::record_usage(&mut self.usage_totals, usage)
    }
}
