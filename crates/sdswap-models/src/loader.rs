//! Format-agnostic checkpoint reading and writing

use crate::record::CheckpointFormat;
use crate::weights::{RawPayload, WeightDictionary};
use sdswap_common::{Device, ModelError, Result, SwapConfig};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Bytes read from the head of a file for content sniffing.
const SNIFF_LEN: u64 = 16;

/// Codec for one checkpoint format.
pub trait ArtifactCodec: Send + Sync {
    fn name(&self) -> &'static str;
    fn format(&self) -> CheckpointFormat;
    /// Whether `header` (the first bytes of a file) looks like this format.
    fn sniff(&self, header: &[u8]) -> bool;
    /// Decode an artifact. Codecs may ignore `device_hint`.
    fn read(&self, path: &Path, device_hint: Option<Device>) -> Result<RawPayload>;
    fn write(&self, weights: &WeightDictionary, path: &Path) -> Result<()>;
}

/// Dispatches reads and writes to the codec registered for each format.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn ArtifactCodec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry").field("formats", &self.available_formats()).finish()
    }
}

impl CodecRegistry {
    /// Registry with no codecs; every read and write reports the codec as unavailable.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Registry with every codec compiled into this build.
    #[allow(unused_mut, unused_variables)]
    pub fn with_defaults(config: &SwapConfig) -> Self {
        let mut registry = Self::empty();
        #[cfg(feature = "pickle-codec")]
        registry.register(Box::new(crate::formats::pickle::PickleCodec));
        #[cfg(feature = "safetensors-codec")]
        registry.register(Box::new(crate::formats::safetensors::SafeTensorsCodec::new(
            config.placement.safetensors_device,
        )));
        registry
    }

    /// Add a codec, replacing any existing one for the same format.
    pub fn register(&mut self, codec: Box<dyn ArtifactCodec>) {
        self.codecs.retain(|c| c.format() != codec.format());
        debug!("Registered {} codec", codec.name());
        self.codecs.push(codec);
    }

    pub fn find(&self, format: CheckpointFormat) -> Option<&dyn ArtifactCodec> {
        self.codecs.iter().find(|c| c.format() == format).map(|c| c.as_ref())
    }

    pub fn available_formats(&self) -> Vec<CheckpointFormat> {
        self.codecs.iter().map(|c| c.format()).collect()
    }

    pub fn read(
        &self,
        path: &Path,
        format: CheckpointFormat,
        device_hint: Option<Device>,
    ) -> Result<RawPayload> {
        let codec = self.find(format).ok_or_else(|| unavailable(format, "decoder", path))?;
        info!("Loading weights [{}] from {}", codec.name(), path.display());
        let payload = codec.read(path, device_hint)?;
        debug!("Decoded {} tensors from {}", payload.len(), path.display());
        Ok(payload)
    }

    /// Write `weights` in the format implied by the destination's extension.
    pub fn write(&self, weights: &WeightDictionary, path: &Path) -> Result<()> {
        let format = CheckpointFormat::from_path(path).ok_or_else(|| ModelError::InvalidFormat {
            format: format!("unrecognised checkpoint extension: {}", path.display()),
        })?;
        let codec = self.find(format).ok_or_else(|| unavailable(format, "encoder", path))?;
        info!("Writing {} tensors [{}] to {}", weights.len(), codec.name(), path.display());
        codec.write(weights, path)
    }

    /// Detect the format of `path`: extension first, then file content.
    pub fn detect_format(&self, path: &Path) -> Result<CheckpointFormat> {
        if let Some(format) = CheckpointFormat::from_path(path) {
            return Ok(format);
        }

        let mut header = Vec::with_capacity(SNIFF_LEN as usize);
        File::open(path)?.take(SNIFF_LEN).read_to_end(&mut header)?;
        self.codecs
            .iter()
            .find(|c| c.sniff(&header))
            .map(|c| c.format())
            .ok_or_else(|| {
                ModelError::InvalidFormat { format: format!("unknown format: {}", path.display()) }
                    .into()
            })
    }
}

fn unavailable(format: CheckpointFormat, operation: &str, path: &Path) -> ModelError {
    ModelError::CodecUnavailable {
        format: format.label().to_string(),
        operation: operation.to_string(),
        path: path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdswap_common::{SwapError, exit_codes};

    #[test]
    fn empty_registry_reports_missing_decoder() {
        let codecs = CodecRegistry::empty();
        let err = codecs
            .read(Path::new("/m/a.ckpt"), CheckpointFormat::LegacyPickle, None)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.exit_code(), exit_codes::EXIT_CODEC_UNAVAILABLE);
        assert!(err.to_string().contains("No decoder available for pickle artifacts"));
    }

    #[test]
    fn write_rejects_unknown_extension() {
        let codecs = CodecRegistry::empty();
        let err = codecs.write(&WeightDictionary::new(), Path::new("/tmp/out.bin")).unwrap_err();
        assert!(matches!(err, SwapError::Model(ModelError::InvalidFormat { .. })));
    }

    #[test]
    fn defaults_cover_both_formats() {
        let codecs = CodecRegistry::with_defaults(&SwapConfig::default());
        let formats = codecs.available_formats();
        assert_eq!(formats.contains(&CheckpointFormat::LegacyPickle), cfg!(feature = "pickle-codec"));
        assert_eq!(
            formats.contains(&CheckpointFormat::SafeBinary),
            cfg!(feature = "safetensors-codec")
        );
    }
}
