//! Parley - web chat backend for OpenAI-compatible endpoints
//!
//! This library provides the server side of a minimal chat client: per-session
//! conversation history, the chat orchestrator that talks to a completion
//! endpoint, token usage accounting, and the locally persisted settings and
//! system prompt library.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Conversation history, image sanitization, usage totals and the session store
//! - `chat`: Request parsing, vision gating and the chat orchestrator
//! - `catalog`: Model list normalization
//! - `providers`: Wire types and the OpenAI-compatible HTTP endpoint
//! - `settings` / `prompts`: Locally persisted preferences and saved system prompts
//! - `storage`: Key-value local store backing settings and prompts
//! - `server`: HTTP routes and the session cookie
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use parley::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!     parley::server::serve(&config).await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod session;
pub mod settings;
pub mod storage;

// Re-export commonly used types
pub use chat::{ChatOrchestrator, ChatReply, ChatRequest};
pub use config::Config;
pub use error::{ParleyError, Result};
pub use session::{SessionState, SessionStore};

pub mod test_utils;
