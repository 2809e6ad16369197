//! Checkpoint discovery, identity and weight handling
//!
//! - [`fingerprint`]: stable short content fingerprint over a fixed byte window
//! - [`CheckpointRegistry`]: scan storage, synthesize titles, natural ordering, lookups
//! - [`KeyMigration`]: rewrite legacy parameter names to the current schema
//! - [`CodecRegistry`]: format-agnostic read/write of weight dictionaries
//! - [`WeightCache`]: bounded LRU of deserialized, migrated weight dictionaries
//! - [`ModelArchitecture`]: architecture config and variant resolution per checkpoint

pub mod architecture;
pub mod cache;
pub mod fingerprint;
pub mod formats;
pub mod loader;
pub mod record;
pub mod registry;
pub mod weight_mapper;
pub mod weights;

pub use architecture::{
    ArchitectureConfig, InpaintingOverrides, ModelArchitecture, resolve_architecture,
    resolve_variant,
};
pub use cache::{CacheStats, WeightCache};
pub use fingerprint::{FINGERPRINT_OFFSET, FINGERPRINT_WINDOW, NO_FILE, fingerprint};
pub use loader::{ArtifactCodec, CodecRegistry};
pub use record::{CheckpointFormat, CheckpointRecord};
pub use registry::{CheckpointRegistry, Resolution, ScanOptions, natural_cmp};
pub use weight_mapper::{KeyMigration, LEGACY_KEY_PREFIXES};
pub use weights::{RawPayload, STATE_DICT_KEY, WeightDictionary};
