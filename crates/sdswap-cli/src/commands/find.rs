//! Fuzzy title lookup

use anyhow::{Result, bail};
use clap::Args;
use sdswap_common::SwapConfig;

use super::scan_registry;

/// Match command arguments
#[derive(Args)]
pub struct MatchCommand {
    /// Fragment of a checkpoint title
    #[arg(value_name = "FRAGMENT")]
    pub fragment: String,

    /// Print the file path instead of the title
    #[arg(long)]
    pub path: bool,
}

impl MatchCommand {
    pub fn execute(&self, config: &SwapConfig) -> Result<()> {
        let registry = scan_registry(config)?;
        let Some(record) = registry.closest_match(&self.fragment) else {
            bail!("No checkpoint title contains '{}'", self.fragment);
        };

        if self.path {
            println!("{}", record.filename().display());
        } else {
            println!("{}", record.title());
        }
        Ok(())
    }
}
