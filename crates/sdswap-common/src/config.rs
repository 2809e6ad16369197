//! Configuration types and utilities
//!
//! Configuration is layered: built-in defaults, then an optional TOML or JSON file, then
//! `SDSWAP_*` environment variables. [`ConfigLoader::load_with_precedence`] applies the layers
//! in that order and validates the result.

use crate::{Device, MemoryStrategy, Result, SwapError, VaeSelection};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;


/// Artifact name used when no preferred checkpoint is configured explicitly.
pub const DEFAULT_PREFERRED_CHECKPOINT: &str = "model.ckpt";

/// Main sdswap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub precision: PrecisionConfig,
    pub placement: PlacementConfig,
    pub selection: SelectionConfig,
}

/// Where checkpoints and their architecture configs live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub models_dir: PathBuf,
    pub extra_dir: Option<PathBuf>,
    /// Registered even when it lives outside the scanned directories.
    pub preferred_checkpoint: Option<PathBuf>,
    /// Architecture config used when a checkpoint has no `<name>.yaml` sidecar.
    pub fallback_config: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models/Stable-diffusion"),
            extra_dir: None,
            preferred_checkpoint: Some(PathBuf::from(DEFAULT_PREFERRED_CHECKPOINT)),
            fallback_config: PathBuf::from("v1-inference.yaml"),
        }
    }
}

/// Weight cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of inactive weight dictionaries kept in memory. `0` disables caching.
    pub checkpoint_cache: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { checkpoint_cache: 1 }
    }
}

/// Precision configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionConfig {
    /// Keep the whole model in float32.
    pub full_precision: bool,
    /// Keep the companion sub-model (VAE) in float32 even when the model is halved.
    pub vae_full_precision: bool,
}

/// Device placement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub device: Device,
    /// Fixed load device for safetensors artifacts; not affected by `weight_load_location`.
    pub safetensors_device: Device,
    /// Device remap applied when reading pickle checkpoints.
    pub weight_load_location: Option<Device>,
    pub low_vram: bool,
    pub med_vram: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            safetensors_device: Device::Cuda(0),
            weight_load_location: None,
            low_vram: false,
            med_vram: false,
        }
    }
}

/// Persisted selection state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Title of the checkpoint to activate.
    pub checkpoint: Option<String>,
    pub vae: VaeSelection,
}

impl SwapConfig {
    pub fn builder() -> SwapConfigBuilder {
        SwapConfigBuilder::new()
    }

    /// Load configuration from a TOML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SwapError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                SwapError::Config(format!("Failed to parse TOML config {}: {}", path.display(), e))
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                SwapError::Config(format!("Failed to parse JSON config {}: {}", path.display(), e))
            })?,
            _ => {
                return Err(SwapError::Config(format!(
                    "Unsupported config file format: {}",
                    path.display()
                )));
            }
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `SDSWAP_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_var("SDSWAP_MODELS_DIR") {
            self.storage.models_dir = PathBuf::from(value);
        }
        if let Some(value) = env_var("SDSWAP_CKPT_DIR") {
            self.storage.extra_dir = optional_path(&value);
        }
        if let Some(value) = env_var("SDSWAP_CKPT") {
            self.storage.preferred_checkpoint = optional_path(&value);
        }
        if let Some(value) = env_var("SDSWAP_CONFIG") {
            self.storage.fallback_config = PathBuf::from(value);
        }
        if let Some(value) = env_var("SDSWAP_CHECKPOINT_CACHE") {
            self.cache.checkpoint_cache = value.trim().parse().map_err(|_| {
                SwapError::Config(format!("Invalid value for SDSWAP_CHECKPOINT_CACHE: {value}"))
            })?;
        }
        if let Some(value) = env_var("SDSWAP_NO_HALF") {
            self.precision.full_precision = parse_bool("SDSWAP_NO_HALF", &value)?;
        }
        if let Some(value) = env_var("SDSWAP_NO_HALF_VAE") {
            self.precision.vae_full_precision = parse_bool("SDSWAP_NO_HALF_VAE", &value)?;
        }
        if let Some(value) = env_var("SDSWAP_DEVICE") {
            self.placement.device = value.parse()?;
        }
        if let Some(value) = env_var("SDSWAP_SAFETENSORS_DEVICE") {
            self.placement.safetensors_device = value.parse()?;
        }
        if let Some(value) = env_var("SDSWAP_WEIGHT_LOAD_LOCATION") {
            self.placement.weight_load_location = match value.trim() {
                "" | "none" => None,
                device => Some(device.parse()?),
            };
        }
        if let Some(value) = env_var("SDSWAP_LOWVRAM") {
            self.placement.low_vram = parse_bool("SDSWAP_LOWVRAM", &value)?;
        }
        if let Some(value) = env_var("SDSWAP_MEDVRAM") {
            self.placement.med_vram = parse_bool("SDSWAP_MEDVRAM", &value)?;
        }
        if let Some(value) = env_var("SDSWAP_CHECKPOINT") {
            self.selection.checkpoint = Some(value);
        }
        if let Some(value) = env_var("SDSWAP_VAE") {
            self.selection.vae = VaeSelection::try_from(value)?;
        }
        Ok(())
    }

    /// Overlay every value in `other` that differs from the built-in default.
    pub fn merge_with(&mut self, other: SwapConfig) {
        let defaults = SwapConfig::default();

        if other.storage.models_dir != defaults.storage.models_dir {
            self.storage.models_dir = other.storage.models_dir;
        }
        if other.storage.extra_dir.is_some() {
            self.storage.extra_dir = other.storage.extra_dir;
        }
        if other.storage.preferred_checkpoint != defaults.storage.preferred_checkpoint {
            self.storage.preferred_checkpoint = other.storage.preferred_checkpoint;
        }
        if other.storage.fallback_config != defaults.storage.fallback_config {
            self.storage.fallback_config = other.storage.fallback_config;
        }
        if other.cache != defaults.cache {
            self.cache = other.cache;
        }
        if other.precision.full_precision {
            self.precision.full_precision = true;
        }
        if other.precision.vae_full_precision {
            self.precision.vae_full_precision = true;
        }
        if other.placement.device != defaults.placement.device {
            self.placement.device = other.placement.device;
        }
        if other.placement.safetensors_device != defaults.placement.safetensors_device {
            self.placement.safetensors_device = other.placement.safetensors_device;
        }
        if other.placement.weight_load_location.is_some() {
            self.placement.weight_load_location = other.placement.weight_load_location;
        }
        if other.placement.low_vram {
            self.placement.low_vram = true;
        }
        if other.placement.med_vram {
            self.placement.med_vram = true;
        }
        if other.selection.checkpoint.is_some() {
            self.selection.checkpoint = other.selection.checkpoint;
        }
        if other.selection.vae != defaults.selection.vae {
            self.selection.vae = other.selection.vae;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.storage.models_dir.as_os_str().is_empty() {
            errors.push("storage.models_dir must not be empty".to_string());
        }
        if self.storage.fallback_config.as_os_str().is_empty() {
            errors.push("storage.fallback_config must not be empty".to_string());
        }
        if self.placement.low_vram && self.placement.med_vram {
            errors.push("placement.low_vram and placement.med_vram are mutually exclusive".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SwapError::Config(errors.join("; ")))
        }
    }

    pub fn memory_strategy(&self) -> MemoryStrategy {
        if self.placement.low_vram {
            MemoryStrategy::LowVram
        } else if self.placement.med_vram {
            MemoryStrategy::MedVram
        } else {
            MemoryStrategy::Standard
        }
    }

    /// Whether the preferred checkpoint is the implicit default rather than a user choice.
    pub fn preferred_is_default(&self) -> bool {
        self.storage
            .preferred_checkpoint
            .as_deref()
            .is_none_or(|path| path == Path::new(DEFAULT_PREFERRED_CHECKPOINT))
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SwapError::Config(format!("Invalid value for {name}: {value}"))),
    }
}

/// Layered configuration loading
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `path` (if any), then environment overrides.
    pub fn load_with_precedence(path: Option<&Path>) -> Result<SwapConfig> {
        let mut config = SwapConfig::default();

        if let Some(path) = path {
            config.merge_with(SwapConfig::from_file(path)?);
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for [`SwapConfig`]
#[derive(Debug, Default)]
pub struct SwapConfigBuilder {
    config: SwapConfig,
}

impl SwapConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.models_dir = dir.into();
        self
    }

    pub fn extra_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.storage.extra_dir = dir;
        self
    }

    pub fn preferred_checkpoint(mut self, path: Option<PathBuf>) -> Self {
        self.config.storage.preferred_checkpoint = path;
        self
    }

    pub fn fallback_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.fallback_config = path.into();
        self
    }

    pub fn checkpoint_cache(mut self, size: usize) -> Self {
        self.config.cache.checkpoint_cache = size;
        self
    }

    pub fn full_precision(mut self, enabled: bool) -> Self {
        self.config.precision.full_precision = enabled;
        self
    }

    pub fn vae_full_precision(mut self, enabled: bool) -> Self {
        self.config.precision.vae_full_precision = enabled;
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.config.placement.device = device;
        self
    }

    pub fn safetensors_device(mut self, device: Device) -> Self {
        self.config.placement.safetensors_device = device;
        self
    }

    pub fn weight_load_location(mut self, device: Option<Device>) -> Self {
        self.config.placement.weight_load_location = device;
        self
    }

    pub fn low_vram(mut self, enabled: bool) -> Self {
        self.config.placement.low_vram = enabled;
        self
    }

    pub fn med_vram(mut self, enabled: bool) -> Self {
        self.config.placement.med_vram = enabled;
        self
    }

    pub fn selected_checkpoint(mut self, title: Option<String>) -> Self {
        self.config.selection.checkpoint = title;
        self
    }

    pub fn vae(mut self, selection: VaeSelection) -> Self {
        self.config.selection.vae = selection;
        self
    }

    pub fn build(self) -> Result<SwapConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
