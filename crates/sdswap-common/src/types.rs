//! Device, precision and placement types shared across crates

use crate::{Result, SwapError};
use candle_core::DType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Compute device a model or tensor lives on.
///
/// Serialized as `cpu`, `cuda`, `cuda:<ordinal>` or `metal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
    Metal,
}

impl Device {
    pub fn is_gpu(&self) -> bool {
        !matches!(self, Device::Cpu)
    }

    /// Convert to the tensor runtime's device handle.
    pub fn to_candle(&self) -> Result<candle_core::Device> {
        match self {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(ordinal) => candle_core::Device::new_cuda(*ordinal)
                .map_err(|e| SwapError::Config(format!("CUDA device {ordinal} unavailable: {e}"))),
            Device::Metal => candle_core::Device::new_metal(0)
                .map_err(|e| SwapError::Config(format!("Metal device unavailable: {e}"))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Device::Metal => write!(f, "metal"),
        }
    }
}

impl FromStr for Device {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            "metal" | "mps" => Ok(Device::Metal),
            other => {
                if let Some(ordinal) = other.strip_prefix("cuda:") {
                    let ordinal = ordinal
                        .parse()
                        .map_err(|_| SwapError::Config(format!("Invalid CUDA ordinal: {s}")))?;
                    return Ok(Device::Cuda(ordinal));
                }
                Err(SwapError::Config(format!("Unknown device: {s}")))
            }
        }
    }
}

impl TryFrom<String> for Device {
    type Error = SwapError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

/// Numeric precision of a model or sub-model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Full,
    Half,
}

impl Precision {
    pub fn dtype(&self) -> DType {
        match self {
            Precision::Full => DType::F32,
            Precision::Half => DType::F16,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Full => write!(f, "float32"),
            Precision::Half => write!(f, "float16"),
        }
    }
}

/// Precision mode recorded after each weight application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionState {
    /// Precision of the main model.
    pub model: Precision,
    /// Precision of the companion sub-model (VAE).
    pub companion: Precision,
}

impl PrecisionState {
    pub fn from_flags(full_precision: bool, vae_full_precision: bool) -> Self {
        let model = if full_precision { Precision::Full } else { Precision::Half };
        let companion = if full_precision || vae_full_precision {
            Precision::Full
        } else {
            Precision::Half
        };
        Self { model, companion }
    }
}

impl Default for PrecisionState {
    fn default() -> Self {
        Self::from_flags(false, false)
    }
}

/// How the model is placed on the compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStrategy {
    /// Whole model on the compute device.
    #[default]
    Standard,
    /// Aggressive offload: only the active sub-module on the device.
    LowVram,
    /// Partial offload of the largest sub-modules.
    MedVram,
}

impl MemoryStrategy {
    /// Low-memory strategies manage placement themselves.
    pub fn is_low_memory(&self) -> bool {
        !matches!(self, MemoryStrategy::Standard)
    }
}

/// Which companion (VAE) artifact to pair with a checkpoint.
///
/// Serialized as `auto`, `none`, or a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VaeSelection {
    /// Look for a companion next to the checkpoint.
    #[default]
    Auto,
    /// Use the companion baked into the checkpoint.
    None,
    Path(PathBuf),
}

impl TryFrom<String> for VaeSelection {
    type Error = SwapError;

    fn try_from(value: String) -> Result<Self> {
        match value.trim() {
            "" => Err(SwapError::Config("Empty VAE selection".to_string())),
            "auto" => Ok(VaeSelection::Auto),
            "none" => Ok(VaeSelection::None),
            path => Ok(VaeSelection::Path(PathBuf::from(path))),
        }
    }
}

impl From<VaeSelection> for String {
    fn from(selection: VaeSelection) -> Self {
        match selection {
            VaeSelection::Auto => "auto".to_string(),
            VaeSelection::None => "none".to_string(),
            VaeSelection::Path(path) => path.display().to_string(),
        }
    }
}
