//! Command-line interface definition for Parley
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving the web backend, one-shot chat,
//! model discovery, and managing the local settings and prompt library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley - minimal chat client for OpenAI-compatible endpoints
///
/// Serves the web chat backend or talks to the endpoint directly from
/// the terminal using the locally stored settings.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path of the local store file holding settings and the prompt library
    #[arg(long, env = "PARLEY_STORE_PATH")]
    pub store_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Parley
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP backend for the web chat client
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message using the stored settings
    ///
    /// The conversation continues across invocations until `--reset`.
    Chat {
        /// Message text
        message: String,

        /// Image file to attach (only sent to vision-capable models)
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Image detail level: low, auto or high (defaults to the stored setting)
        #[arg(long)]
        detail: Option<String>,

        /// Clear the conversation history before sending, keeping token totals
        #[arg(long)]
        reset: bool,

        /// Start a new conversation, clearing history and token totals
        #[arg(long, conflicts_with = "reset")]
        new: bool,
    },

    /// List models offered by the endpoint
    Models {
        /// Endpoint base URL (defaults to the stored settings)
        #[arg(long)]
        base_url: Option<String>,

        /// API key (defaults to the stored settings)
        #[arg(long)]
        api_key: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show or change the stored settings
    Settings {
        /// Settings subcommand
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Manage the system prompt library
    Prompts {
        /// Prompt library subcommand
        #[command(subcommand)]
        command: PromptCommand,
    },
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Print the merged settings
    Show,

    /// Update one or more fields
    Set {
        /// Endpoint base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Model identifier
        #[arg(long)]
        model: Option<String>,

        /// API key
        #[arg(long)]
        api_key: Option<String>,

        /// System prompt
        #[arg(long)]
        system_prompt: Option<String>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<String>,

        /// Completion token cap; empty or non-positive means no limit
        #[arg(long)]
        max_tokens: Option<String>,

        /// Detail level for image attachments: low, auto or high
        #[arg(long)]
        image_detail: Option<String>,
    },

    /// Restore the defaults
    Reset,
}

/// Prompt library subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PromptCommand {
    /// List saved prompts
    List,

    /// Save a prompt
    Add {
        /// Prompt text
        content: String,

        /// Title (derived from the first line when omitted)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Delete a saved prompt
    Remove {
        /// Prompt id
        id: String,
    },

    /// Make a saved prompt the current system prompt
    Use {
        /// Prompt id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            store_path: None,
            command: Commands::Serve {
                host: None,
                port: None,
            },
        }
    }
}
