//! Settings commands

use crate::cli::SettingsCommand;
use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::providers::ImageDetail;
use crate::settings::{
    coerce_max_tokens, parse_temperature, Settings, SettingsPatch, SettingsStore,
};
use crate::storage::LocalStore;
use colored::Colorize;
use prettytable::{format, row, Table};

/// Handle settings commands
pub fn handle_settings(config: &Config, command: SettingsCommand) -> Result<()> {
    let store = super::open_store(config)?;
    run(&store, config, command)
}

/// Handle a settings command against a given store
pub fn run(store: &dyn LocalStore, config: &Config, command: SettingsCommand) -> Result<()> {
    let settings_store = SettingsStore::new(store, Settings::defaults(config));

    match command {
        SettingsCommand::Show => {
            let settings = settings_store.load()?;
            settings_table(&settings).printstd();
        }
        SettingsCommand::Set {
            base_url,
            model,
            api_key,
            system_prompt,
            temperature,
            max_tokens,
            image_detail,
        } => {
            let patch = build_patch(
                base_url,
                model,
                api_key,
                system_prompt,
                temperature,
                max_tokens,
                image_detail,
            )?;
            if patch.is_empty() {
                println!("{}", "Nothing to change.".yellow());
                return Ok(());
            }
            let settings = settings_store.save(patch)?;
            println!("{}", "Settings saved.".green());
            settings_table(&settings).printstd();
        }
        SettingsCommand::Reset => {
            let settings = settings_store.reset()?;
            println!("{}", "Settings restored to defaults.".green());
            settings_table(&settings).printstd();
        }
    }

    Ok(())
}

/// Build a patch from raw command line values
///
/// An empty `max_tokens` clears the limit.
///
/// # Errors
///
/// Returns `ParleyError::Config` for a temperature that is not a number or
/// an unknown image detail level
pub fn build_patch(
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    system_prompt: Option<String>,
    temperature: Option<String>,
    max_tokens: Option<String>,
    image_detail: Option<String>,
) -> Result<SettingsPatch> {
    let temperature = match temperature {
        Some(raw) => Some(
            parse_temperature(&serde_json::Value::String(raw.clone()))
                .ok_or_else(|| ParleyError::Config(format!("Invalid temperature: {:?}", raw)))?,
        ),
        None => None,
    };
    let image_detail = match image_detail {
        Some(raw) => Some(ImageDetail::parse(&raw).ok_or_else(|| {
            ParleyError::Config(format!("Invalid image detail: {:?} (low, auto, high)", raw))
        })?),
        None => None,
    };

    Ok(SettingsPatch {
        base_url,
        model_id: model,
        api_key,
        system_prompt,
        temperature,
        max_tokens: max_tokens.map(|raw| coerce_max_tokens(&serde_json::Value::String(raw))),
        image_detail,
    })
}

fn settings_table(settings: &Settings) -> Table {
    let system_prompt = if settings.system_prompt.is_empty() {
        "(none)".to_string()
    } else {
        settings.system_prompt.clone()
    };
    let max_tokens = settings
        .max_tokens
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unlimited".to_string());

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["Base URL", settings.base_url]);
    table.add_row(row!["Model", settings.model_id]);
    table.add_row(row!["API key", mask_key(&settings.api_key)]);
    table.add_row(row!["System prompt", system_prompt]);
    table.add_row(row!["Temperature", settings.temperature]);
    table.add_row(row!["Max tokens", max_tokens]);
    table.add_row(row!["Image detail", settings.image_detail.as_str()]);
    table
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return key.to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
