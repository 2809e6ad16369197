//! Show which checkpoint a load would use

use anyhow::Result;
use clap::Args;
use console::style;
use sdswap_common::SwapConfig;
use sdswap_models::{Resolution, resolve_variant};
use serde_json::json;

use super::scan_registry;

/// Resolve command arguments
#[derive(Args)]
pub struct ResolveCommand {
    /// Requested title; defaults to the configured selection
    #[arg(value_name = "TITLE")]
    pub title: Option<String>,

    /// Output format as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl ResolveCommand {
    pub fn execute(&self, config: &SwapConfig) -> Result<()> {
        let registry = scan_registry(config)?;
        let requested = self.title.as_deref().or(config.selection.checkpoint.as_deref());
        let resolution = registry.resolve_selected(requested)?;

        let (record, variant) = resolve_variant(resolution.record());
        let requested_title = match &resolution {
            Resolution::Exact(_) => None,
            Resolution::Fallback { requested, .. } => requested.clone(),
        };

        if self.json {
            let output = json!({
                "title": record.title(),
                "filename": record.filename(),
                "config": record.config_path(),
                "variant": if variant { "inpainting" } else { "standard" },
                "fallback": resolution.is_fallback(),
                "requested": requested_title,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if let Some(requested) = requested_title {
            println!("{} '{}' not found, falling back", style("warning:").yellow().bold(), requested);
        }
        println!("{}", record.title());
        println!("  file:    {}", record.filename().display());
        println!("  config:  {}", record.config_path().display());
        if variant {
            println!("  variant: inpainting");
        }
        Ok(())
    }
}
