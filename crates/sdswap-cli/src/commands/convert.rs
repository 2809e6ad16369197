//! Checkpoint format conversion

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use sdswap_common::{Device, SwapConfig};
use sdswap_models::{CodecRegistry, KeyMigration};
use std::path::PathBuf;
use tracing::info;

use super::{host_config, locate_artifact};

/// Convert command arguments
#[derive(Args)]
pub struct ConvertCommand {
    /// Source checkpoint path or title fragment
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Destination file; its extension selects the output format
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Keep legacy parameter names instead of migrating them
    #[arg(long)]
    pub no_migrate: bool,

    /// Overwrite the destination if it exists
    #[arg(short, long)]
    pub force: bool,
}

impl ConvertCommand {
    pub fn execute(&self, config: &SwapConfig) -> Result<()> {
        let input = locate_artifact(&self.input, config)?;
        if self.output.exists() && !self.force {
            bail!("{} already exists; pass --force to overwrite", self.output.display());
        }
        if input == self.output {
            bail!("Input and output are the same file: {}", input.display());
        }

        let codecs = CodecRegistry::with_defaults(&host_config(config));
        let format = codecs.detect_format(&input)?;
        let payload = codecs.read(&input, format, Some(Device::Cpu))?;

        let migration = if self.no_migrate {
            KeyMigration::new(Vec::<(String, String)>::new())?
        } else {
            KeyMigration::default()
        };
        let weights = migration.normalize(payload);

        codecs.write(&weights, &self.output)?;
        info!("Converted {} -> {}", input.display(), self.output.display());
        println!(
            "{} wrote {} tensors to {}",
            style("✓").green(),
            weights.len(),
            self.output.display()
        );
        Ok(())
    }
}
