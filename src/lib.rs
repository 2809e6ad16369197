//! # sdswap
//!
//! Checkpoint registry, weight cache and hot-swap orchestration for diffusion inference.
//!
//! - [`common`]: configuration, errors, device and precision types
//! - [`models`]: checkpoint discovery, fingerprints, codecs, key migration and the weight cache
//! - [`engine`]: the [`HotSwap`] orchestrator and the traits a host implements to drive it
//!
//! ```no_run
//! use sdswap::{ConfigLoader, CheckpointRegistry, ScanOptions};
//!
//! # fn main() -> sdswap::Result<()> {
//! let config = ConfigLoader::load_with_precedence(None)?;
//! let registry = CheckpointRegistry::scan(&ScanOptions::from(&config))?;
//! for title in registry.titles_sorted() {
//!     println!("{title}");
//! }
//! # Ok(())
//! # }
//! ```

pub use sdswap_common as common;
pub use sdswap_engine as engine;
pub use sdswap_models as models;

pub use sdswap_common::{
    ConfigLoader, Device, MemoryStrategy, ModelError, Precision, PrecisionState, Result,
    SwapConfig, SwapError, VaeSelection, exit_codes,
};
pub use sdswap_engine::{
    CheckpointModel, CompanionLoader, DevicePlacement, DirectPlacement, HotSwap,
    HotSwapBuilder, LoadReport, ModelFactory, ModelHooks, ReloadOutcome, SwapState,
};
pub use sdswap_models::{
    CheckpointFormat, CheckpointRecord, CheckpointRegistry, CodecRegistry, KeyMigration,
    ModelArchitecture, ScanOptions, WeightCache, WeightDictionary, fingerprint,
};
