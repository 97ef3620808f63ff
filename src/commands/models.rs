//! Model listing command
//!
//! Queries the endpoint named by the stored settings (or the flags) and
//! prints the normalized catalog as a table or as JSON.

use crate::catalog::{self, ModelDescriptor};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{Connection, OpenAiEndpoint};
use crate::settings::{Settings, SettingsStore};
use colored::Colorize;
use prettytable::{format, row, Table};
use std::time::Duration;

/// List available models from the endpoint
///
/// # Examples
///
/// ```no_run
/// use parley::config::Config;
/// use parley::commands::models::list_models;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// list_models(&config, None, None, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_models(
    config: &Config,
    base_url: Option<String>,
    api_key: Option<String>,
    json: bool,
) -> Result<()> {
    let store = super::open_store(config)?;
    let settings = SettingsStore::new(&store, Settings::defaults(config)).load()?;
    let connection = Connection::new(
        base_url.unwrap_or(settings.base_url),
        api_key.unwrap_or(settings.api_key),
    );

    tracing::info!("Listing models from {}", connection.base_url);

    let endpoint = OpenAiEndpoint::new(Duration::from_secs(config.upstream.timeout_seconds))?;
    let models = catalog::list_models(&endpoint, &connection).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "models": models }))?
        );
        return Ok(());
    }

    if models.is_empty() {
        println!("{}", "No models reported by the endpoint.".yellow());
        return Ok(());
    }

    println!("\nAvailable models at {}:", connection.base_url);
    models_table(&models, &settings.model_id).printstd();
    println!();
    Ok(())
}

/// Render descriptors as a table, marking the currently selected model
pub fn models_table(models: &[ModelDescriptor], selected: &str) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.set_titles(row!["", "Model", "Owned By"]);

    for model in models {
        let marker = if model.id == selected { "*" } else { "" };
        table.add_row(row![
            marker,
            model.id,
            model.owned_by.as_deref().unwrap_or("-")
        ]);
    }
    table
}
