//! Hot-swap orchestration for the active checkpoint model
//!
//! [`HotSwap`] owns the registry, the weight cache and the single active model. It
//! decides per selection whether new weights can be swapped into the live model or the
//! model must be rebuilt, and sequences teardown, precision conversion, placement and
//! hooks around that decision. Everything outside that sequence is supplied through the
//! traits in [`collaborators`].

pub mod apply;
pub mod collaborators;
pub mod fatal;
pub mod placement;
pub mod swap;

pub use apply::{LoadReport, apply_lenient};
pub use collaborators::{
    CheckpointModel, CompanionLoader, ModelFactory, ModelHooks, NoCompanion, NoHooks,
    PostLoadCallback, PrecisionRecorder, SharedPrecision,
};
pub use fatal::{FatalExit, ProcessExit};
pub use placement::{DevicePlacement, DirectPlacement};
pub use swap::{ActiveModel, HotSwap, HotSwapBuilder, ReloadOutcome, SwapState};
