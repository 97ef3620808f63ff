/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `chat`: one chat turn using the stored settings
- `models`: list the endpoint's models
- `settings`: show, change or reset the stored settings
- `prompts`: manage the system prompt library

The handlers work against the local store, which plays the role of the
browser's local storage for the web client.
*/

use crate::config::Config;
use crate::error::Result;
use crate::storage::FileStore;

pub mod chat;
pub mod models;
pub mod prompts;
pub mod settings;

/// Open the local store named by the configuration
///
/// Falls back to the platform data directory when no path is configured.
pub fn open_store(config: &Config) -> Result<FileStore> {
    match &config.store.path {
        Some(path) => FileStore::new_with_path(path),
        None => FileStore::new(),
    }
}
