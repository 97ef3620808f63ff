//! Parley - web chat backend for OpenAI-compatible endpoints
//!
#![doc = "Parley - web chat backend for OpenAI-compatible endpoints"]
#![doc = "Main entry point for the Parley server and terminal commands."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::cli::{Cli, Commands};
use parley::commands;
use parley::config::Config;
use parley::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting HTTP server");
            server::serve(&config).await?;
            Ok(())
        }
        Commands::Chat {
            message,
            image,
            detail,
            reset,
            new,
        } => {
            if let Some(path) = &image {
                tracing::debug!("Attaching image: {}", path.display());
            }
            commands::chat::run_chat(&config, message, image, detail, reset, new).await?;
            Ok(())
        }
        Commands::Models {
            base_url,
            api_key,
            json,
        } => {
            tracing::info!("Listing models");
            commands::models::list_models(&config, base_url, api_key, json).await?;
            Ok(())
        }
        Commands::Settings { command } => {
            commands::settings::handle_settings(&config, command)?;
            Ok(())
        }
        Commands::Prompts { command } => {
            commands::prompts::handle_prompts(&config, command)?;
            Ok(())
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "parley=debug" } else { "parley=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
