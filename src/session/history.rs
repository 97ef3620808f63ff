//! Conversation history sanitization and migration
//!
//! History never keeps image payloads: every image part is swapped for a
//! short text placeholder when a message is stored, and again when stored
//! history is read back so state written by older builds heals itself.

use crate::providers::{ContentPart, Message, MessageContent, Role};

/// Text that replaces image attachments in stored history
pub const IMAGE_PLACEHOLDER: &str = "[Image attachment omitted from history]";

/// Replace every image part with the placeholder text part
///
/// Plain text content and non-image parts are returned unchanged. The
/// operation is idempotent.
///
/// # Examples
///
/// ```
/// use parley::providers::{ContentPart, MessageContent};
/// use parley::session::history::{sanitize_content, IMAGE_PLACEHOLDER};
///
/// let content = MessageContent::Parts(vec![
///     ContentPart::text("look"),
///     ContentPart::image("data:image/png;base64,AAAA", None),
/// ]);
/// let clean = sanitize_content(content);
/// assert_eq!(
///     clean,
///     MessageContent::Parts(vec![ContentPart::text("look"), ContentPart::text(IMAGE_PLACEHOLDER)])
/// );
/// ```
pub fn sanitize_content(content: MessageContent) -> MessageContent {
    match content {
        MessageContent::Text(text) => MessageContent::Text(text),
        MessageContent::Parts(parts) => MessageContent::Parts(
            parts
                .into_iter()
                .map(|part| {
                    if part.is_image() {
                        ContentPart::text(IMAGE_PLACEHOLDER)
                    } else {
                        part
                    }
                })
                .collect(),
        ),
    }
}

/// Sanitize the content of a message
pub fn sanitize_message(message: Message) -> Message {
    Message {
        role: message.role,
        content: sanitize_content(message.content),
    }
}

/// Decode stored history leniently
///
/// Non-object entries and entries with an unknown role are dropped, missing
/// or `null` content becomes empty text, and content is sanitized. Returns
/// the cleaned messages and whether anything had to change.
pub fn decode_history(stored: Option<&serde_json::Value>) -> (Vec<Message>, bool) {
    let entries = match stored {
        None | Some(serde_json::Value::Null) => return (Vec::new(), false),
        Some(serde_json::Value::Array(entries)) => entries,
        Some(other) => {
            tracing::warn!("Discarding stored history that is not a list: {}", other);
            return (Vec::new(), true);
        }
    };

    let mut messages = Vec::with_capacity(entries.len());
    let mut migrated = false;

    for entry in entries {
        let Some(object) = entry.as_object() else {
            tracing::debug!("Dropping non-object history entry");
            migrated = true;
            continue;
        };

        let Some(role) = object
            .get("role")
            .and_then(|r| r.as_str())
            .and_then(Role::parse)
        else {
            tracing::debug!("Dropping history entry with unknown role: {:?}", object.get("role"));
            migrated = true;
            continue;
        };

        let content = match object.get("content") {
            None | Some(serde_json::Value::Null) => {
                migrated = true;
                MessageContent::default()
            }
            Some(raw) => match serde_json::from_value::<MessageContent>(raw.clone()) {
                Ok(content) => content,
                Err(_) => {
                    tracing::debug!("Replacing undecodable history content: {}", raw);
                    migrated = true;
                    MessageContent::Text(raw.to_string())
                }
            },
        };

        if content.has_image() {
            migrated = true;
        }

        messages.push(Message {
            role,
            content: sanitize_content(content),
        });
    }

    (messages, migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ImageDetail;
    use serde_json::json;

    fn image_message() -> Message {
        Message::user(vec![
            ContentPart::text("what is this"),
            ContentPart::image("data:image/jpeg;base64,/9j/4AAQ", Some(ImageDetail::High)),
        ])
    }

    #[test]
    fn test_sanitize_text_is_unchanged() {
        let content = MessageContent::from("hello");
        assert_eq!(sanitize_content(content.clone()), content);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_message(image_message());
        let twice = sanitize_message(once.clone());
        assert_eq!(once, twice);
        assert!(!once.content.has_image());
    }

    #[test]
    fn test_sanitize_keeps_other_parts() {
        let other = ContentPart::Other(json!({"type": "input_audio"}));
        let content = MessageContent::Parts(vec![other.clone(), ContentPart::text("x")]);
        assert_eq!(
            sanitize_content(content),
            MessageContent::Parts(vec![other, ContentPart::text("x")])
        );
    }

    #[test]
    fn test_sanitize_loose_image_part() {
        let content: MessageContent =
            serde_json::from_value(json!([{"type": "image_url", "image_url": "data:..."}]))
                .unwrap();
        assert_eq!(
            sanitize_content(content),
            MessageContent::Parts(vec![ContentPart::text(IMAGE_PLACEHOLDER)])
        );
    }

    #[test]
    fn test_decode_absent_history() {
        let (messages, migrated) = decode_history(None);
        assert!(messages.is_empty());
        assert!(!migrated);
    }

    #[test]
    fn test_decode_drops_malformed_entries() {
        let stored = json!([
            "garbage",
            {"role": "user", "content": "Hello"},
            42,
            {"role": "tool", "content": "x"},
            {"role": "assistant", "content": null},
        ]);
        let (messages, migrated) = decode_history(Some(&stored));
        assert!(migrated);
        assert_eq!(
            messages,
            vec![Message::user("Hello"), Message::assistant("")]
        );
    }

    #[test]
    fn test_decode_heals_raw_images() {
        let stored = json!([{
            "role": "user",
            "content": [
                {"type": "text", "text": "see"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ]
        }]);
        let (messages, migrated) = decode_history(Some(&stored));
        assert!(migrated);
        let serialized = serde_json::to_string(&messages).unwrap();
        assert!(!serialized.contains("base64"));
        assert!(serialized.contains(IMAGE_PLACEHOLDER));
    }

    #[test]
    fn test_decode_clean_history_is_not_migrated() {
        let stored = serde_json::to_value(vec![
            Message::user("Hello"),
            Message::assistant("Hi!"),
            sanitize_message(image_message()),
        ])
        .unwrap();
        let (messages, migrated) = decode_history(Some(&stored));
        assert!(!migrated);
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let stored = json!([
            1,
            {"role": "user", "content": [{"type": "image_url", "image_url": {"url": "x"}}]}
        ]);
        let (first, _) = decode_history(Some(&stored));
        let reencoded = serde_json::to_value(&first).unwrap();
        let (second, migrated) = decode_history(Some(&reencoded));
        assert_eq!(first, second);
        assert!(!migrated);
    }

    #[test]
    fn test_text_part_with_extra_fields_round_trips() {
        let part = json!({"type": "text", "text": "hi", "cache_control": {"type": "ephemeral"}});
        let stored = json!([{"role": "user", "content": [part.clone()]}]);

        let (messages, migrated) = decode_history(Some(&stored));
        assert!(!migrated);
        assert_eq!(
            serde_json::to_value(&messages[0].content).unwrap(),
            json!([part])
        );
    }

    #[test]
    fn test_image_part_with_extra_fields_is_still_replaced() {
        let stored = json!([{
            "role": "user",
            "content": [{
                "type": "image_url",
                "image_url": {"url": "data:image/png;base64,AAAA"},
                "cache_control": {"type": "ephemeral"}
            }]
        }]);

        let (messages, migrated) = decode_history(Some(&stored));
        assert!(migrated);
        assert_eq!(
            messages[0].content,
            MessageContent::Parts(vec![ContentPart::text(IMAGE_PLACEHOLDER)])
        );
    }

    #[test]
    fn test_decode_non_list_history() {
        let (messages, migrated) = decode_history(Some(&json!({"role": "user"})));
        assert!(messages.is_empty());
        assert!(migrated);
    }
}
