//! Seams to the host application
//!
//! The orchestrator never builds networks, places tensors on devices or patches model
//! behaviour itself. It drives these traits in a fixed order.

use candle_core::Tensor;
use sdswap_common::{Device, Precision, PrecisionState, Result, VaeSelection};
use sdswap_models::{CheckpointRecord, ModelArchitecture};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A model whose parameters can be overwritten by name.
pub trait CheckpointModel {
    /// Detachable sub-model (the VAE) kept out of precision conversion on request.
    type Companion;

    /// Names of every parameter the model expects.
    fn parameter_names(&self) -> Vec<String>;

    /// Overwrite one parameter. Shape or dtype mismatches are errors.
    fn assign(&mut self, name: &str, tensor: &Tensor) -> Result<()>;

    fn to_device(&mut self, device: Device) -> Result<()>;

    fn convert_precision(&mut self, precision: Precision) -> Result<()>;

    /// Convert only the companion sub-model. Runs after every weight application, so a
    /// companion stored at a lower precision is widened when full precision is requested.
    fn convert_companion_precision(&mut self, precision: Precision) -> Result<()>;

    fn take_companion(&mut self) -> Option<Self::Companion>;

    fn restore_companion(&mut self, companion: Self::Companion);

    /// Switch to inference mode.
    fn set_eval(&mut self) {}
}

/// Instantiates a model from its architecture.
pub trait ModelFactory {
    type Model: CheckpointModel;

    fn instantiate(&mut self, architecture: &ModelArchitecture) -> Result<Self::Model>;
}

/// Behaviour patches installed around the live model.
pub trait ModelHooks<M> {
    /// Runs before a model is instantiated for `architecture`.
    fn prepare(&mut self, _architecture: &ModelArchitecture) -> Result<()> {
        Ok(())
    }

    fn install(&mut self, model: &mut M) -> Result<()>;

    fn uninstall(&mut self, model: &mut M);
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<M> ModelHooks<M> for NoHooks {
    fn install(&mut self, _model: &mut M) -> Result<()> {
        Ok(())
    }

    fn uninstall(&mut self, _model: &mut M) {}
}

/// Resolves and loads the companion (VAE) artifact paired with a checkpoint.
pub trait CompanionLoader<M> {
    /// Companion artifact to use for `checkpoint`, if any.
    fn resolve(&self, checkpoint: &Path, selection: &VaeSelection) -> Option<PathBuf>;

    /// Load `companion` into `model`; `None` keeps the weights baked into the checkpoint.
    fn load(&mut self, model: &mut M, companion: Option<&Path>) -> Result<()>;
}

/// Companion loader that only honours explicit paths and never loads anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompanion;

impl<M> CompanionLoader<M> for NoCompanion {
    fn resolve(&self, _checkpoint: &Path, selection: &VaeSelection) -> Option<PathBuf> {
        match selection {
            VaeSelection::Path(path) => Some(path.clone()),
            VaeSelection::Auto | VaeSelection::None => None,
        }
    }

    fn load(&mut self, _model: &mut M, companion: Option<&Path>) -> Result<()> {
        if let Some(path) = companion {
            debug!("No companion loader installed; ignoring {}", path.display());
        }
        Ok(())
    }
}

/// Receives the precision mode after every weight application.
pub trait PrecisionRecorder {
    fn record(&mut self, state: PrecisionState);
}

/// Precision state shared with downstream numeric code.
#[derive(Debug, Clone, Default)]
pub struct SharedPrecision {
    inner: Arc<RwLock<PrecisionState>>,
}

impl SharedPrecision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PrecisionState {
        match self.inner.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl PrecisionRecorder for SharedPrecision {
    fn record(&mut self, state: PrecisionState) {
        match self.inner.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

/// Invoked after every successful load or swap.
pub type PostLoadCallback<M> = Box<dyn FnMut(&M, &CheckpointRecord)>;
