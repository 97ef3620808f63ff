//! Prompt library commands

use crate::cli::PromptCommand;
use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::prompts::{PromptEntry, PromptLibrary};
use crate::settings::{Settings, SettingsPatch, SettingsStore};
use crate::storage::LocalStore;
use colored::Colorize;
use prettytable::{format, row, Table};

const PREVIEW_CHARS: usize = 60;

/// Handle prompt library commands
pub fn handle_prompts(config: &Config, command: PromptCommand) -> Result<()> {
    let store = super::open_store(config)?;
    run(&store, config, command)
}

/// Handle a prompt library command against a given store
pub fn run(store: &dyn LocalStore, config: &Config, command: PromptCommand) -> Result<()> {
    let library = PromptLibrary::new(store);

    match command {
        PromptCommand::List => {
            let entries = library.list()?;
            if entries.is_empty() {
                println!("{}", "No saved prompts.".yellow());
                return Ok(());
            }
            println!("\nSaved prompts:");
            prompts_table(&entries).printstd();
            println!();
            println!(
                "Use {} to make one the system prompt.",
                "parley prompts use <ID>".cyan()
            );
        }
        PromptCommand::Add { content, title } => {
            let entry = library.add(&content, title.as_deref())?;
            println!(
                "{} {} ({})",
                "Saved prompt".green(),
                entry.title,
                entry.id.cyan()
            );
        }
        PromptCommand::Remove { id } => {
            if library.remove(&id)? {
                println!("{}", format!("Removed prompt {}", id).green());
            } else {
                println!("{}", format!("No prompt with id {}", id).yellow());
            }
        }
        PromptCommand::Use { id } => {
            let entry = library
                .get(&id)?
                .ok_or_else(|| ParleyError::Storage(format!("No prompt with id {}", id)))?;
            SettingsStore::new(store, Settings::defaults(config)).save(SettingsPatch {
                system_prompt: Some(entry.content),
                ..SettingsPatch::default()
            })?;
            println!(
                "{}",
                format!("System prompt set from \"{}\"", entry.title).green()
            );
        }
    }

    Ok(())
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn prompts_table(entries: &[PromptEntry]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.set_titles(row!["ID", "Title", "Content"]);
    for entry in entries {
        table.add_row(row![entry.id, entry.title, preview(&entry.content)]);
    }
    table
}
