//! Checkpoint records and on-disk formats

use std::fmt;
use std::path::{Path, PathBuf};

/// Serialization format of a checkpoint artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointFormat {
    /// Python pickle archive (`.ckpt`).
    LegacyPickle,
    /// SafeTensors (`.safetensors`).
    SafeBinary,
}

impl CheckpointFormat {
    pub const ALL: [CheckpointFormat; 2] = [CheckpointFormat::LegacyPickle, CheckpointFormat::SafeBinary];

    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            CheckpointFormat::LegacyPickle => "ckpt",
            CheckpointFormat::SafeBinary => "safetensors",
        }
    }

    /// Short label embedded in titles.
    pub fn label(&self) -> &'static str {
        match self {
            CheckpointFormat::LegacyPickle => "pickle",
            CheckpointFormat::SafeBinary => "safetensors",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

impl fmt::Display for CheckpointFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable description of one discovered checkpoint.
///
/// Two records are the same checkpoint only if every field matches, which is what the
/// weight cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointRecord {
    filename: PathBuf,
    title: String,
    fingerprint: String,
    short_name: String,
    config_path: PathBuf,
    format: CheckpointFormat,
}

impl CheckpointRecord {
    pub fn new(
        filename: impl Into<PathBuf>,
        title: impl Into<String>,
        fingerprint: impl Into<String>,
        short_name: impl Into<String>,
        config_path: impl Into<PathBuf>,
        format: CheckpointFormat,
    ) -> Self {
        Self {
            filename: filename.into(),
            title: title.into(),
            fingerprint: fingerprint.into(),
            short_name: short_name.into(),
            config_path: config_path.into(),
            format,
        }
    }

    /// Absolute path of the artifact.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Unique display key: `<relative name> [<format>] [<fingerprint>]`.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Architecture config this checkpoint is built from.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn format(&self) -> CheckpointFormat {
        self.format
    }

    /// Same checkpoint, different architecture config.
    pub fn with_config_path(&self, config_path: impl Into<PathBuf>) -> Self {
        Self { config_path: config_path.into(), ..self.clone() }
    }

    /// Whether the artifact is an inpainting checkpoint paired with a non-inpainting config.
    pub fn requires_inpainting_variant(&self) -> bool {
        let stem_marks_inpainting = self
            .filename
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with("inpainting"));
        let config_is_inpainting = self
            .config_path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with("inpainting.yaml"));
        stem_marks_inpainting && !config_is_inpainting
    }
}

impl fmt::Display for CheckpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}
