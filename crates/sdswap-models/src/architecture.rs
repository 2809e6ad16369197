//! Architecture configs and variant resolution
//!
//! Each checkpoint is paired with a YAML architecture document. Inpainting checkpoints
//! shipped without a dedicated config are built from the base document plus a fixed set
//! of overrides, and carry a distinct config identity so a later swap notices the change.

use crate::record::CheckpointRecord;
use sdswap_common::{ModelError, Result};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INPAINTING_SUFFIX: &str = "-inpainting.yaml";

/// Parsed architecture document and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchitectureConfig {
    path: PathBuf,
    document: Value,
}

impl ArchitectureConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ModelError::NotFound { path: path.display().to_string() }.into());
        }
        let text = std::fs::read_to_string(path)?;
        let document: Value = serde_yaml::from_str(&text).map_err(|e| invalid(path, e))?;
        Self::from_document(path, document)
    }

    /// Wrap an already-parsed document. The document must have a `model` mapping.
    pub fn from_document(path: impl Into<PathBuf>, document: Value) -> Result<Self> {
        let path = path.into();
        if !matches!(document.get("model"), Some(Value::Mapping(_))) {
            return Err(invalid(&path, "missing 'model' section"));
        }
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// `model.target`, the class the model factory instantiates.
    pub fn model_target(&self) -> Option<&str> {
        model_target(&self.document)
    }
}

/// Overrides turning a base architecture into its inpainting variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpaintingOverrides {
    pub target: String,
    pub use_ema: bool,
    pub conditioning_key: String,
    pub in_channels: u64,
}

impl Default for InpaintingOverrides {
    fn default() -> Self {
        Self {
            target: "ldm.models.diffusion.ddpm.LatentInpaintDiffusion".to_string(),
            use_ema: false,
            conditioning_key: "hybrid".to_string(),
            in_channels: 9,
        }
    }
}

impl InpaintingOverrides {
    /// Copy of `document` with the overrides applied; missing sections are created.
    pub fn apply(&self, document: &Value) -> std::result::Result<Value, String> {
        let mut out = document.clone();
        set_path(&mut out, &["model", "target"], Value::String(self.target.clone()))?;
        set_path(&mut out, &["model", "params", "use_ema"], Value::Bool(self.use_ema))?;
        set_path(
            &mut out,
            &["model", "params", "conditioning_key"],
            Value::String(self.conditioning_key.clone()),
        )?;
        set_path(
            &mut out,
            &["model", "params", "unet_config", "params", "in_channels"],
            Value::Number(self.in_channels.into()),
        )?;
        Ok(out)
    }
}

/// Architecture a checkpoint is instantiated from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelArchitecture {
    Standard(ArchitectureConfig),
    Inpainting {
        base: ArchitectureConfig,
        overrides: InpaintingOverrides,
        /// Synthetic config path that never matches a standard config.
        identity: PathBuf,
        document: Value,
    },
}

impl ModelArchitecture {
    /// Path used to decide whether two checkpoints share an architecture.
    pub fn config_identity(&self) -> &Path {
        match self {
            ModelArchitecture::Standard(config) => config.path(),
            ModelArchitecture::Inpainting { identity, .. } => identity,
        }
    }

    /// Document the model factory should build from.
    pub fn effective_document(&self) -> &Value {
        match self {
            ModelArchitecture::Standard(config) => config.document(),
            ModelArchitecture::Inpainting { document, .. } => document,
        }
    }

    pub fn model_target(&self) -> Option<&str> {
        model_target(self.effective_document())
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, ModelArchitecture::Inpainting { .. })
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            ModelArchitecture::Standard(_) => "standard",
            ModelArchitecture::Inpainting { .. } => "inpainting",
        }
    }
}

/// The record as it will be tracked once loaded, and whether it needs the variant.
///
/// Pure: only looks at names, never at the filesystem.
pub fn resolve_variant(record: &CheckpointRecord) -> (CheckpointRecord, bool) {
    if record.requires_inpainting_variant() {
        let identity = inpainting_identity(record.config_path());
        (record.with_config_path(identity), true)
    } else {
        (record.clone(), false)
    }
}

/// Build the architecture for `record` from its base config.
///
/// Returns the resolved record (carrying the variant identity when one applies) with
/// the architecture.
pub fn resolve_architecture(
    record: &CheckpointRecord,
    base: ArchitectureConfig,
) -> Result<(CheckpointRecord, ModelArchitecture)> {
    let (resolved, variant) = resolve_variant(record);
    if !variant {
        return Ok((resolved, ModelArchitecture::Standard(base)));
    }

    info!("Using inpainting variant of {} for {}", base.path().display(), record.title());
    let overrides = InpaintingOverrides::default();
    let document = overrides.apply(base.document()).map_err(|reason| invalid(base.path(), reason))?;
    let identity = resolved.config_path().to_path_buf();
    debug!("Variant config identity {}", identity.display());
    Ok((resolved, ModelArchitecture::Inpainting { base, overrides, identity, document }))
}

fn inpainting_identity(config: &Path) -> PathBuf {
    let name = config.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let renamed = match name.strip_suffix(".yaml") {
        Some(stem) => format!("{stem}{INPAINTING_SUFFIX}"),
        None => format!("{name}{INPAINTING_SUFFIX}"),
    };
    config.with_file_name(renamed)
}

fn model_target(document: &Value) -> Option<&str> {
    document.get("model")?.get("target")?.as_str()
}

fn set_path(doc: &mut Value, keys: &[&str], value: Value) -> std::result::Result<(), String> {
    let Some((last, parents)) = keys.split_last() else {
        return Ok(());
    };

    let mut node = doc;
    for key in parents {
        let map = match node {
            Value::Mapping(map) => map,
            _ => return Err(format!("'{key}' parent is not a mapping")),
        };
        if !map.contains_key(*key) {
            map.insert(Value::from(*key), Value::Mapping(Mapping::new()));
        }
        node = map.get_mut(*key).ok_or_else(|| format!("cannot descend into '{key}'"))?;
    }

    match node {
        Value::Mapping(map) => {
            map.insert(Value::from(*last), value);
            Ok(())
        }
        _ => Err(format!("'{last}' parent is not a mapping")),
    }
}

fn invalid(path: &Path, reason: impl std::fmt::Display) -> sdswap_common::SwapError {
    ModelError::InvalidConfig { path: path.display().to_string(), reason: reason.to_string() }
        .into()
}
