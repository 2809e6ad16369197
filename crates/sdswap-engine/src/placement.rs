//! Device placement of the live model

use crate::collaborators::CheckpointModel;
use sdswap_common::{Device, MemoryStrategy, Result};
use tracing::debug;

/// Moves the model between host and compute device.
pub trait DevicePlacement<M> {
    /// Initial placement after a fresh load.
    fn place(&mut self, model: &mut M, strategy: MemoryStrategy) -> Result<()>;

    /// Move the model off the compute device ahead of a weight swap.
    fn park(&mut self, model: &mut M, strategy: MemoryStrategy) -> Result<()>;

    /// Move a parked model back. Not called under low-memory strategies.
    fn restore(&mut self, model: &mut M) -> Result<()>;

    /// Release memory freed by a dropped model.
    fn reclaim_memory(&mut self) {}
}

/// Whole-model moves via [`CheckpointModel::to_device`].
///
/// Under a low-memory strategy the model stays on the host; per-module offload
/// belongs to the host application.
#[derive(Debug, Clone, Copy)]
pub struct DirectPlacement {
    device: Device,
}

impl DirectPlacement {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl<M: CheckpointModel> DevicePlacement<M> for DirectPlacement {
    fn place(&mut self, model: &mut M, strategy: MemoryStrategy) -> Result<()> {
        if strategy.is_low_memory() {
            debug!("{:?} strategy: keeping model on host", strategy);
            return model.to_device(Device::Cpu);
        }
        debug!("Placing model on {}", self.device);
        model.to_device(self.device)
    }

    fn park(&mut self, model: &mut M, _strategy: MemoryStrategy) -> Result<()> {
        model.to_device(Device::Cpu)
    }

    fn restore(&mut self, model: &mut M) -> Result<()> {
        model.to_device(self.device)
    }
}
