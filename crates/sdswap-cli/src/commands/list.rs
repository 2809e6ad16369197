//! List discovered checkpoints

use anyhow::Result;
use clap::Args;
use console::style;
use sdswap_common::SwapConfig;
use serde_json::json;

use super::scan_registry;

/// List command arguments
#[derive(Args)]
pub struct ListCommand {
    /// Show fingerprint, format and architecture config for each checkpoint
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl ListCommand {
    pub fn execute(&self, config: &SwapConfig) -> Result<()> {
        let registry = scan_registry(config)?;
        let selected = registry
            .resolve_selected(config.selection.checkpoint.as_deref())
            .ok()
            .map(|resolution| resolution.record().title().to_string());

        if self.json {
            let checkpoints: Vec<_> = registry
                .titles_sorted()
                .into_iter()
                .filter_map(|title| registry.get(title))
                .map(|record| {
                    json!({
                        "title": record.title(),
                        "filename": record.filename(),
                        "short_name": record.short_name(),
                        "hash": record.fingerprint(),
                        "format": record.format().label(),
                        "config": record.config_path(),
                        "selected": selected.as_deref() == Some(record.title()),
                    })
                })
                .collect();
            let output = json!({
                "searched": registry.searched_locations(),
                "checkpoints": checkpoints,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if registry.is_empty() {
            println!("{}", style("No checkpoints found").yellow());
            for location in registry.searched_locations() {
                println!("  searched {location}");
            }
            return Ok(());
        }

        for title in registry.titles_sorted() {
            let marker = if selected.as_deref() == Some(title) { "*" } else { " " };
            println!("{} {}", style(marker).green().bold(), title);
            if self.verbose
                && let Some(record) = registry.get(title)
            {
                println!("    {}", style(record.filename().display()).dim());
                println!("    config: {}", record.config_path().display());
            }
        }
        Ok(())
    }
}
