//! Configuration management for Parley
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Parley
///
/// Holds the HTTP server settings, the default completion endpoint,
/// chat behavior, and the location of the local store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Default completion endpoint used when a request carries no override
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Chat orchestration settings
    #[serde(default)]
    pub chat: ChatConfig,
    /// Local store settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Lifetime of a session (and its cookie) in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_session_ttl() -> u64 {
    86_400 // 1 day
}

fn default_cookie_name() -> String {
    "parley_session".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_ttl_seconds: default_session_ttl(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API (including `/v1`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as a bearer token
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Default model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

// LM Studio ignores the token, but the API requires one
fn default_api_key() -> String {
    "lm-studio".to_string()
}

fn default_model() -> String {
    "qwen/qwen3-30b-a3b-2507".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Chat orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Case-insensitive regex patterns identifying vision-capable models
    #[serde(default = "default_vision_patterns")]
    pub vision_model_patterns: Vec<String>,

    /// Temperature used when a request does not supply a usable one
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
}

fn default_vision_patterns() -> Vec<String> {
    vec!["magistral".to_string()]
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            vision_model_patterns: default_vision_patterns(),
            default_temperature: default_temperature(),
        }
    }
}

/// Local store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Explicit store file; the platform data directory is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ParleyError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ParleyError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            self.upstream.base_url = base_url;
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.upstream.api_key = api_key;
        }

        if let Ok(model) = std::env::var("MODEL_ID") {
            self.upstream.model = model;
        }

        if let Ok(host) = std::env::var("PARLEY_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("PARLEY_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Ignoring invalid PARLEY_PORT value: {}", port);
            }
        }

        if let Ok(ttl) = std::env::var("PARLEY_SESSION_TTL_SECONDS") {
            if let Ok(value) = ttl.parse() {
                self.server.session_ttl_seconds = value;
            } else {
                tracing::warn!("Ignoring invalid PARLEY_SESSION_TTL_SECONDS value: {}", ttl);
            }
        }

        if let Ok(store_path) = std::env::var("PARLEY_STORE_PATH") {
            self.store.path = Some(store_path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(store_path) = &cli.store_path {
            self.store.path = Some(store_path.clone());
        }

        if let crate::cli::Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(ParleyError::Config("server.host cannot be empty".to_string()).into());
        }

        if self.server.session_ttl_seconds == 0 {
            return Err(ParleyError::Config(
                "server.session_ttl_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let cookie_name = &self.server.cookie_name;
        if cookie_name.is_empty()
            || !cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ParleyError::Config(format!(
                "server.cookie_name must be non-empty and use [A-Za-z0-9_-]: {:?}",
                cookie_name
            ))
            .into());
        }

        crate::providers::parse_base_url(&self.upstream.base_url)
            .map_err(|e| ParleyError::Config(format!("upstream.base_url: {}", e)))?;

        if self.upstream.model.trim().is_empty() {
            return Err(ParleyError::Config("upstream.model cannot be empty".to_string()).into());
        }

        if self.upstream.timeout_seconds == 0 {
            return Err(ParleyError::Config(
                "upstream.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        for pattern in &self.chat.vision_model_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                ParleyError::Config(format!("Invalid vision model pattern {:?}: {}", pattern, e))
            })?;
        }

        if !(0.0..=2.0).contains(&self.chat.default_temperature) {
            return Err(ParleyError::Config(
                "chat.default_temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
