//! CLI command implementations

pub mod convert;
pub mod find;
pub mod hash;
pub mod inspect;
pub mod list;
pub mod resolve;

pub use convert::ConvertCommand;
pub use find::MatchCommand;
pub use hash::HashCommand;
pub use inspect::InspectCommand;
pub use list::ListCommand;
pub use resolve::ResolveCommand;

use anyhow::{Context, Result};
use sdswap_common::{Device, SwapConfig};
use sdswap_models::{CheckpointRegistry, ScanOptions};
use std::path::{Path, PathBuf};

/// Scan the configured storage roots.
pub(crate) fn scan_registry(config: &SwapConfig) -> Result<CheckpointRegistry> {
    CheckpointRegistry::scan(&ScanOptions::from(config)).context("Failed to scan checkpoints")
}

/// Configuration for reading artifacts in the CLI, which never touches an accelerator.
pub(crate) fn host_config(config: &SwapConfig) -> SwapConfig {
    let mut host = config.clone();
    host.placement.safetensors_device = Device::Cpu;
    host.placement.weight_load_location = Some(Device::Cpu);
    host
}

/// Treat `target` as a path when it exists, otherwise as a title fragment.
pub(crate) fn locate_artifact(target: &str, config: &SwapConfig) -> Result<PathBuf> {
    let path = Path::new(target);
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let registry = scan_registry(config)?;
    registry
        .closest_match(target)
        .map(|record| record.filename().to_path_buf())
        .with_context(|| format!("No file or checkpoint title matches '{target}'"))
}
