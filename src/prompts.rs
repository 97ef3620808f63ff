//! Library of reusable system prompts
//!
//! Entries live in the local store under `systemPromptLibrary` as a JSON
//! array of `{id, title, content}` objects, in insertion order.

use crate::error::Result;
use crate::storage::LocalStore;
use serde::{Deserialize, Serialize};

/// Local store key holding the prompt library
pub const PROMPT_LIBRARY_KEY: &str = "systemPromptLibrary";

/// Title used when a prompt has no non-blank line
pub const FALLBACK_TITLE: &str = "Saved prompt";

const MAX_TITLE_CHARS: usize = 80;

/// One saved system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEntry {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Derive a display title from prompt content
///
/// Uses the first non-blank line, trimmed. Lines longer than 80 characters
/// are cut to 77 characters followed by `...`.
///
/// # Examples
///
/// ```
/// use parley::prompts::derive_title;
///
/// assert_eq!(derive_title("\n  You are a pirate.  \nArr"), "You are a pirate.");
/// assert_eq!(derive_title("   "), "Saved prompt");
/// assert_eq!(derive_title(&"x".repeat(100)).chars().count(), 80);
/// ```
pub fn derive_title(content: &str) -> String {
    let Some(first) = content.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return FALLBACK_TITLE.to_string();
    };

    if first.chars().count() > MAX_TITLE_CHARS {
        let cut: String = first.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}

/// Prompt library over a local store
pub struct PromptLibrary<'a> {
    store: &'a dyn LocalStore,
}

impl<'a> PromptLibrary<'a> {
    /// Open the library in a local store
    pub fn new(store: &'a dyn LocalStore) -> Self {
        Self { store }
    }

    /// All entries in insertion order
    ///
    /// Entries that are not objects or lack a string `content` are dropped.
    /// Entries without an id receive a fresh one, and the repaired list is
    /// written back so the ids stay stable.
    pub fn list(&self) -> Result<Vec<PromptEntry>> {
        let stored = match self.store.get_json(PROMPT_LIBRARY_KEY)? {
            None => return Ok(Vec::new()),
            Some(serde_json::Value::Array(entries)) => entries,
            Some(_) => {
                tracing::warn!("Stored prompt library is not a list, ignoring it");
                return Ok(Vec::new());
            }
        };

        let mut repaired = false;
        let mut entries = Vec::with_capacity(stored.len());
        for raw in &stored {
            let Some(content) = raw.get("content").and_then(|c| c.as_str()) else {
                tracing::debug!("Dropping malformed prompt library entry");
                repaired = true;
                continue;
            };

            let id = match raw.get("id").and_then(|i| i.as_str()) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    repaired = true;
                    new_prompt_id()
                }
            };

            let title = raw
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();

            entries.push(PromptEntry {
                id,
                title,
                content: content.to_string(),
            });
        }

        if repaired {
            self.persist(&entries)?;
        }
        Ok(entries)
    }

    /// Save a new prompt and return it
    ///
    /// A blank `title` is replaced by one derived from the content. Identical
    /// prompts are stored again rather than merged.
    pub fn add(&self, content: &str, title: Option<&str>) -> Result<PromptEntry> {
        let title = match title.map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => derive_title(content),
        };

        let entry = PromptEntry {
            id: new_prompt_id(),
            title,
            content: content.to_string(),
        };

        let mut entries = self.list()?;
        entries.push(entry.clone());
        self.persist(&entries)?;

        tracing::info!("Saved prompt {} ({})", entry.id, entry.title);
        Ok(entry)
    }

    /// Delete a prompt, returning whether it existed
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.list()?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(&entries)?;
        tracing::info!("Removed prompt {}", id);
        Ok(true)
    }

    /// Look up a prompt by id
    pub fn get(&self, id: &str) -> Result<Option<PromptEntry>> {
        Ok(self.list()?.into_iter().find(|entry| entry.id == id))
    }

    fn persist(&self, entries: &[PromptEntry]) -> Result<()> {
        self.store
            .set_json(PROMPT_LIBRARY_KEY, &serde_json::to_value(entries)?)
    }
}

fn new_prompt_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_empty_library() {
        let store = MemoryStore::new();
        assert!(PromptLibrary::new(&store).list().unwrap().is_empty());
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let store = MemoryStore::new();
        let library = PromptLibrary::new(&store);
        let first = library.add("Be terse.", None).unwrap();
        let second = library.add("Answer in French.", Some("French")).unwrap();

        let entries = library.list().unwrap();
        assert_eq!(entries, vec![first, second]);
        assert_eq!(entries[0].title, "Be terse.");
        assert_eq!(entries[1].title, "French");
    }

    #[test]
    fn test_add_never_deduplicates() {
        let store = MemoryStore::new();
        let library = PromptLibrary::new(&store);
        let a = library.add("same", None).unwrap();
        let b = library.add("same", None).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(library.list().unwrap().len(), 2);
    }

    #[test]
    fn test_blank_title_is_derived() {
        let store = MemoryStore::new();
        let entry = PromptLibrary::new(&store)
            .add("\n\nSummarize the text.\nThen stop.", Some("   "))
            .unwrap();
        assert_eq!(entry.title, "Summarize the text.");
    }

    #[test]
    fn test_derive_title_truncates_long_lines() {
        let line = "a".repeat(81);
        let title = derive_title(&line);
        assert_eq!(title, format!("{}...", "a".repeat(77)));

        let exact = "b".repeat(80);
        assert_eq!(derive_title(&exact), exact);
    }

    #[test]
    fn test_derive_title_counts_characters() {
        let line = "é".repeat(90);
        let title = derive_title(&line);
        assert_eq!(title.chars().count(), 80);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_remove() {
        let store = MemoryStore::new();
        let library = PromptLibrary::new(&store);
        let keep = library.add("keep", None).unwrap();
        let drop = library.add("drop", None).unwrap();

        assert!(library.remove(&drop.id).unwrap());
        assert!(!library.remove(&drop.id).unwrap());
        assert_eq!(library.list().unwrap(), vec![keep]);
    }

    #[test]
    fn test_get() {
        let store = MemoryStore::new();
        let library = PromptLibrary::new(&store);
        let entry = library.add("Be terse.", None).unwrap();
        assert_eq!(library.get(&entry.id).unwrap(), Some(entry));
        assert_eq!(library.get("missing").unwrap(), None);
    }

    #[test]
    fn test_list_repairs_stored_entries() {
        let store = MemoryStore::new();
        store
            .set_json(
                PROMPT_LIBRARY_KEY,
                &json!([
                    null,
                    {"title": "no content"},
                    {"content": "no id"},
                    {"id": "p1", "title": 3, "content": "bad title"}
                ]),
            )
            .unwrap();

        let library = PromptLibrary::new(&store);
        let entries = library.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].id.is_empty());
        assert_eq!(entries[0].title, "");
        assert_eq!(entries[1].id, "p1");
        assert_eq!(entries[1].title, "");

        // assigned ids survive the next read
        assert_eq!(library.list().unwrap()[0].id, entries[0].id);
    }

    #[test]
    fn test_non_list_library_is_ignored() {
        let store = MemoryStore::new();
        store
            .set_json(PROMPT_LIBRARY_KEY, &json!({"content": "x"}))
            .unwrap();
        assert!(PromptLibrary::new(&store).list().unwrap().is_empty());
    }
}
