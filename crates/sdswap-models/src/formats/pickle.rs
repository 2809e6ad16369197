//! Legacy pickle (`.ckpt`) codec
//!
//! Read-only: decoding goes through candle's pickle reader, and no encoder exists, so
//! writes report the codec as unavailable.

use crate::loader::ArtifactCodec;
use crate::record::CheckpointFormat;
use crate::weights::{RawPayload, STATE_DICT_KEY, WeightDictionary};
use candle_core::Tensor;
use sdswap_common::{Device, ModelError, Result, SwapError};
use std::path::Path;
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PICKLE_PROTO: u8 = 0x80;

pub struct PickleCodec;

impl ArtifactCodec for PickleCodec {
    fn name(&self) -> &'static str {
        "pickle"
    }

    fn format(&self) -> CheckpointFormat {
        CheckpointFormat::LegacyPickle
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.starts_with(ZIP_MAGIC)
            || matches!(header, [PICKLE_PROTO, proto, ..] if (2..=5).contains(proto))
    }

    fn read(&self, path: &Path, device_hint: Option<Device>) -> Result<RawPayload> {
        let enveloped = candle_core::pickle::read_all_with_key(path, Some(STATE_DICT_KEY));
        let (is_enveloped, entries) = match enveloped {
            Ok(entries) if !entries.is_empty() => (true, entries),
            _ => {
                debug!("No '{}' envelope in {}", STATE_DICT_KEY, path.display());
                let entries = candle_core::pickle::read_all_with_key(path, None).map_err(|e| {
                    ModelError::LoadingFailed {
                        reason: format!("cannot decode {}: {e}", path.display()),
                    }
                })?;
                (false, entries)
            }
        };

        let device = device_hint.unwrap_or_default();
        let entries = place(entries, device)?;
        if is_enveloped {
            Ok(RawPayload::Enveloped { key: STATE_DICT_KEY.to_string(), entries })
        } else {
            Ok(RawPayload::Flat(entries))
        }
    }

    fn write(&self, _weights: &WeightDictionary, path: &Path) -> Result<()> {
        Err(ModelError::CodecUnavailable {
            format: self.format().label().to_string(),
            operation: "encoder".to_string(),
            path: path.display().to_string(),
        }
        .into())
    }
}

fn place(entries: Vec<(String, Tensor)>, device: Device) -> Result<Vec<(String, Tensor)>> {
    if !device.is_gpu() {
        return Ok(entries);
    }
    let target = device.to_candle()?;
    entries
        .into_iter()
        .map(|(name, tensor)| Ok::<_, SwapError>((name, tensor.to_device(&target)?)))
        .collect()
}
