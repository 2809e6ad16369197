//! SafeTensors codec
//!
//! Reads always land on the codec's fixed device; the per-call hint is ignored.

use crate::loader::ArtifactCodec;
use crate::record::CheckpointFormat;
use crate::weights::{RawPayload, WeightDictionary};
use candle_core::{DType, Tensor};
use safetensors::tensor::{Dtype, TensorView};
use sdswap_common::{Device, ModelError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Upper bound on a plausible header length when sniffing.
const MAX_HEADER_LEN: u64 = 100 * 1024 * 1024;

pub struct SafeTensorsCodec {
    device: Device,
}

impl SafeTensorsCodec {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl ArtifactCodec for SafeTensorsCodec {
    fn name(&self) -> &'static str {
        "safetensors"
    }

    fn format(&self) -> CheckpointFormat {
        CheckpointFormat::SafeBinary
    }

    fn sniff(&self, header: &[u8]) -> bool {
        let Some((len, rest)) = header.split_first_chunk::<8>() else {
            return false;
        };
        let len = u64::from_le_bytes(*len);
        len > 1 && len <= MAX_HEADER_LEN && rest.first() == Some(&b'{')
    }

    fn read(&self, path: &Path, device_hint: Option<Device>) -> Result<RawPayload> {
        if let Some(hint) = device_hint
            && hint != self.device
        {
            debug!("Ignoring device hint {} for safetensors; loading on {}", hint, self.device);
        }

        let device = self.device.to_candle()?;
        let tensors = candle_core::safetensors::load(path, &device).map_err(|e| {
            ModelError::LoadingFailed { reason: format!("cannot decode {}: {e}", path.display()) }
        })?;

        let mut entries: Vec<(String, Tensor)> = tensors.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(RawPayload::Flat(entries))
    }

    fn write(&self, weights: &WeightDictionary, path: &Path) -> Result<()> {
        let mut encoded = Vec::with_capacity(weights.len());
        for name in weights.sorted_keys() {
            if let Some(tensor) = weights.get(name) {
                let (dtype, bytes) = encode_tensor(name, tensor)?;
                encoded.push((name, dtype, tensor.dims().to_vec(), bytes));
            }
        }

        let mut views = Vec::with_capacity(encoded.len());
        for (name, dtype, shape, bytes) in &encoded {
            let view = TensorView::new(*dtype, shape.clone(), bytes).map_err(|e| {
                ModelError::LoadingFailed { reason: format!("cannot encode tensor {name}: {e}") }
            })?;
            views.push((*name, view));
        }

        let metadata = HashMap::from([("format".to_string(), "pt".to_string())]);
        safetensors::serialize_to_file(views.iter().map(|(n, v)| (*n, v)), Some(metadata), path)
            .map_err(|e| ModelError::LoadingFailed {
                reason: format!("cannot write {}: {e}", path.display()),
            })?;
        Ok(())
    }
}

fn encode_tensor(name: &str, tensor: &Tensor) -> Result<(Dtype, Vec<u8>)> {
    let flat = tensor.flatten_all()?.to_device(&candle_core::Device::Cpu)?;
    let encoded = match tensor.dtype() {
        DType::U8 => (Dtype::U8, flat.to_vec1::<u8>()?),
        DType::U32 => (Dtype::U32, bytemuck::cast_slice(&flat.to_vec1::<u32>()?).to_vec()),
        DType::I64 => (Dtype::I64, bytemuck::cast_slice(&flat.to_vec1::<i64>()?).to_vec()),
        DType::F16 => (Dtype::F16, bytemuck::cast_slice(&flat.to_vec1::<half::f16>()?).to_vec()),
        DType::BF16 => {
            (Dtype::BF16, bytemuck::cast_slice(&flat.to_vec1::<half::bf16>()?).to_vec())
        }
        DType::F32 => (Dtype::F32, bytemuck::cast_slice(&flat.to_vec1::<f32>()?).to_vec()),
        DType::F64 => (Dtype::F64, bytemuck::cast_slice(&flat.to_vec1::<f64>()?).to_vec()),
        #[allow(unreachable_patterns)]
        other => {
            return Err(ModelError::InvalidFormat {
                format: format!("tensor {name} has unsupported dtype {other:?}"),
            }
            .into());
        }
    };
    Ok(encoded)
}
