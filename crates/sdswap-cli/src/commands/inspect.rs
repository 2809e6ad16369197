//! Weight inspection for diagnostics and debugging

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use sdswap_common::{Device, SwapConfig};
use sdswap_models::{CodecRegistry, KeyMigration, fingerprint};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use super::{host_config, locate_artifact};

/// Inspect command arguments
#[derive(Args)]
pub struct InspectCommand {
    /// Checkpoint path or title fragment
    #[arg(value_name = "CHECKPOINT")]
    pub target: String,

    /// List every legacy parameter name that would be renamed
    #[arg(long)]
    pub show_migrations: bool,

    /// Output format as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl InspectCommand {
    pub fn execute(&self, config: &SwapConfig) -> Result<()> {
        let path = locate_artifact(&self.target, config)?;
        let codecs = CodecRegistry::with_defaults(&host_config(config));
        let format = codecs.detect_format(&path)?;
        debug!("Inspecting {} as {}", path.display(), format);

        let payload = codecs.read(&path, format, Some(Device::Cpu))?;
        let enveloped = payload.is_enveloped();
        let migration = KeyMigration::default();
        let renames = migration.dry_run(payload.entries().iter().map(|(name, _)| name.as_str()));
        let weights = migration.normalize(payload);

        let mut dtypes: BTreeMap<&str, usize> = BTreeMap::new();
        let mut prefixes: BTreeMap<String, usize> = BTreeMap::new();
        for (name, tensor) in weights.iter() {
            *dtypes.entry(tensor.dtype().as_str()).or_default() += 1;
            let prefix = name.split('.').next().unwrap_or(name.as_str()).to_string();
            *prefixes.entry(prefix).or_default() += 1;
        }
        let hash = fingerprint(&path);

        if self.json {
            let mut output = json!({
                "path": path,
                "hash": hash,
                "format": format.label(),
                "enveloped": enveloped,
                "tensors": weights.len(),
                "bytes": weights.total_bytes(),
                "dtypes": dtypes,
                "prefixes": prefixes,
                "legacy_keys": renames.len(),
            });
            if self.show_migrations {
                output["migrations"] = json!(renames
                    .iter()
                    .map(|(from, to)| json!({ "from": from, "to": to }))
                    .collect::<Vec<_>>());
            }
            let text = serde_json::to_string_pretty(&output).context("Failed to render report")?;
            println!("{text}");
            return Ok(());
        }

        println!("{}", style(path.display()).bold());
        println!("  hash:      {hash}");
        println!("  format:    {}", format.label());
        println!("  envelope:  {}", if enveloped { "state_dict" } else { "none" });
        println!("  tensors:   {}", weights.len());
        println!("  size:      {:.1} MiB", weights.total_bytes() as f64 / (1024.0 * 1024.0));
        println!("  dtypes:");
        for (dtype, count) in &dtypes {
            println!("    {dtype:<8} {count}");
        }
        println!("  prefixes:");
        for (prefix, count) in &prefixes {
            println!("    {prefix:<24} {count}");
        }
        if renames.is_empty() {
            println!("  legacy keys: none");
        } else {
            println!("  legacy keys: {}", style(renames.len()).yellow());
            if self.show_migrations {
                for (from, to) in &renames {
                    println!("    {from} -> {to}");
                }
            }
        }
        Ok(())
    }
}
