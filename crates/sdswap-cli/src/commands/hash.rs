//! Content fingerprints

use anyhow::Result;
use clap::Args;
use sdswap_models::fingerprint;
use std::path::PathBuf;

/// Hash command arguments
#[derive(Args)]
pub struct HashCommand {
    /// Files to fingerprint
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

impl HashCommand {
    pub fn execute(&self) -> Result<()> {
        for file in &self.files {
            println!("{}  {}", fingerprint(file), file.display());
        }
        Ok(())
    }
}
