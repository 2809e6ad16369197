//! End-to-end: discover checkpoints on disk, load one, swap through the rest.
//!
//! Uses the default placement, hooks and companion collaborators with a small
//! tensor-backed model so the whole pipeline runs on the host.

use candle_core::{DType, Device as CandleDevice, Tensor};
use sdswap::models::formats::safetensors::SafeTensorsCodec;
use sdswap::models::ArtifactCodec;
use sdswap::{
    CheckpointModel, CheckpointRegistry, Device, HotSwap, ModelArchitecture, ModelFactory,
    Precision, ReloadOutcome, Result, ScanOptions, SwapConfig, SwapError, WeightDictionary,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const UNET: &str = "model.diffusion_model.input_blocks.0.0.weight";
const TEXT: &str = "cond_stage_model.transformer.text_model.final_layer_norm.weight";
const LEGACY_TEXT: &str = "cond_stage_model.transformer.final_layer_norm.weight";
const VAE: &str = "first_stage_model.encoder.conv_in.weight";

const V1_CONFIG: &str = "model:
  target: ldm.models.diffusion.ddpm.LatentDiffusion
  params:
    unet_config:
      params:
        in_channels: 4
";

const V2_CONFIG: &str = "model:
  target: ldm.models.diffusion.ddpm.LatentDiffusion
  params:
    parameterization: v
";

// ── Model ────────────────────────────────────────────────────────────────────

/// Parameters keyed by name, shape-checked on assignment.
struct TensorModel {
    params: HashMap<String, Tensor>,
    target: String,
}

impl TensorModel {
    fn scalar(&self, name: &str) -> f32 {
        let tensor = self.params.get(name).unwrap().to_dtype(DType::F32).unwrap();
        tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap()[0]
    }
}

impl CheckpointModel for TensorModel {
    type Companion = Tensor;

    fn parameter_names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    fn assign(&mut self, name: &str, tensor: &Tensor) -> Result<()> {
        let current = self.params.get_mut(name).ok_or_else(|| {
            SwapError::Validation(format!("unknown parameter {name}"))
        })?;
        if current.dims() != tensor.dims() {
            return Err(SwapError::Validation(format!("shape mismatch for {name}")));
        }
        *current = tensor.to_dtype(current.dtype())?;
        Ok(())
    }

    fn to_device(&mut self, device: Device) -> Result<()> {
        let device = device.to_candle()?;
        for tensor in self.params.values_mut() {
            *tensor = tensor.to_device(&device)?;
        }
        Ok(())
    }

    fn convert_precision(&mut self, precision: Precision) -> Result<()> {
        for tensor in self.params.values_mut() {
            *tensor = tensor.to_dtype(precision.dtype())?;
        }
        Ok(())
    }

    fn convert_companion_precision(&mut self, precision: Precision) -> Result<()> {
        if let Some(vae) = self.params.get_mut(VAE) {
            *vae = vae.to_dtype(precision.dtype())?;
        }
        Ok(())
    }

    fn take_companion(&mut self) -> Option<Tensor> {
        self.params.remove(VAE)
    }

    fn restore_companion(&mut self, companion: Tensor) {
        self.params.insert(VAE.to_string(), companion);
    }
}

#[derive(Default)]
struct TensorFactory {
    built: usize,
}

impl ModelFactory for TensorFactory {
    type Model = TensorModel;

    fn instantiate(&mut self, architecture: &ModelArchitecture) -> Result<TensorModel> {
        self.built += 1;
        let params = [UNET, TEXT, VAE]
            .into_iter()
            .map(|name| {
                let tensor = Tensor::zeros((2, 2), DType::F32, &CandleDevice::Cpu)?;
                Ok((name.to_string(), tensor))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        let target = architecture.model_target().unwrap_or_default().to_string();
        Ok(TensorModel { params, target })
    }
}

// ── Fixture ──────────────────────────────────────────────────────────────────

fn write_checkpoint(path: &Path, names: &[&str], value: f32) {
    let weights: WeightDictionary = names
        .iter()
        .map(|name| {
            (name.to_string(), Tensor::full(value, (2, 2), &CandleDevice::Cpu).unwrap())
        })
        .collect();
    SafeTensorsCodec::new(Device::Cpu).write(&weights, path).unwrap();
}

/// models/{a,b,legacy}.safetensors share the fallback config; v2.safetensors has a sidecar.
fn store() -> (TempDir, SwapConfig) {
    let root = TempDir::new().unwrap();
    let models = root.path().join("models");
    fs::create_dir_all(&models).unwrap();

    let fallback = root.path().join("v1-inference.yaml");
    fs::write(&fallback, V1_CONFIG).unwrap();

    write_checkpoint(&models.join("a.safetensors"), &[UNET, TEXT, VAE], 1.0);
    write_checkpoint(&models.join("b.safetensors"), &[UNET, TEXT, VAE], 2.0);
    write_checkpoint(&models.join("legacy.safetensors"), &[UNET, LEGACY_TEXT, VAE], 3.0);
    write_checkpoint(&models.join("v2.safetensors"), &[UNET, TEXT, VAE], 4.0);
    fs::write(models.join("v2.yaml"), V2_CONFIG).unwrap();

    let config = SwapConfig::builder()
        .models_dir(&models)
        .preferred_checkpoint(None)
        .fallback_config(fallback)
        .device(Device::Cpu)
        .safetensors_device(Device::Cpu)
        .checkpoint_cache(2)
        .build()
        .unwrap();
    (root, config)
}

fn title(swap: &HotSwap<TensorFactory>, fragment: &str) -> sdswap::CheckpointRecord {
    swap.closest_match(fragment).unwrap().clone()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn registry_sees_every_artifact() {
    let (_root, config) = store();
    let registry = CheckpointRegistry::scan(&ScanOptions::from(&config)).unwrap();

    let shorts: Vec<&str> = registry.records().iter().map(|r| r.short_name()).collect();
    assert_eq!(shorts, vec!["a", "b", "legacy", "v2"]);

    let v2 = registry.closest_match("v2").unwrap();
    assert_eq!(v2.config_path().file_name().unwrap(), "v2.yaml");
    assert_eq!(v2.fingerprint().len(), 8);
}

#[test]
fn load_then_swap_through_the_store() {
    let (_root, config) = store();
    let mut swap = HotSwap::builder(config, TensorFactory::default()).build().unwrap();
    swap.setup().unwrap();

    swap.load_model(None).unwrap();
    let active = swap.active().unwrap();
    assert_eq!(active.record.short_name(), "a");
    assert_eq!(active.model.target, "ldm.models.diffusion.ddpm.LatentDiffusion");
    assert_eq!(active.model.params[UNET].dtype(), DType::F16);
    assert!(active.report.is_exact());

    let a = title(&swap, "a.safetensors");
    assert_eq!(swap.reload_model_weights(Some(a)).unwrap(), ReloadOutcome::Unchanged);

    let b = title(&swap, "b.safetensors");
    assert_eq!(swap.reload_model_weights(Some(b)).unwrap(), ReloadOutcome::Swapped);
    assert_eq!(swap.active_model().unwrap().scalar(UNET), 2.0);

    let legacy = title(&swap, "legacy");
    assert_eq!(swap.reload_model_weights(Some(legacy)).unwrap(), ReloadOutcome::Swapped);
    let model = swap.active_model().unwrap();
    assert_eq!(model.scalar(TEXT), 3.0);
    assert!(!model.params.contains_key(LEGACY_TEXT));

    let v2 = title(&swap, "v2");
    assert_eq!(swap.reload_model_weights(Some(v2)).unwrap(), ReloadOutcome::Rebuilt);
    assert_eq!(swap.active_model().unwrap().scalar(UNET), 4.0);
    assert_eq!(swap.active_record().unwrap().short_name(), "v2");
}

#[test]
fn cache_serves_revisited_checkpoints() {
    let (_root, config) = store();
    let mut swap = HotSwap::builder(config, TensorFactory::default()).build().unwrap();
    swap.setup().unwrap();

    swap.load_model(None).unwrap();
    let b = title(&swap, "b.safetensors");
    let a = title(&swap, "a.safetensors");
    swap.reload_model_weights(Some(b)).unwrap();
    swap.reload_model_weights(Some(a.clone())).unwrap();

    let stats = swap.cache().stats();
    assert_eq!(stats.hits, 1);
    assert!(swap.cache().contains(&a));
    assert!(swap.cache().len() <= 3);
    assert_eq!(swap.active_model().unwrap().scalar(UNET), 1.0);
}

#[test]
fn full_precision_keeps_float32() {
    let (_root, mut config) = store();
    config.precision.full_precision = true;
    let mut swap = HotSwap::builder(config, TensorFactory::default()).build().unwrap();
    swap.setup().unwrap();

    swap.load_model(None).unwrap();
    let active = swap.active().unwrap();
    assert_eq!(active.model.params[UNET].dtype(), DType::F32);
    assert_eq!(active.precision.model, Precision::Full);
}

#[test]
fn vae_stays_float32_when_requested() {
    let (_root, mut config) = store();
    config.precision.vae_full_precision = true;
    let mut swap = HotSwap::builder(config, TensorFactory::default()).build().unwrap();
    swap.setup().unwrap();

    swap.load_model(None).unwrap();
    let model = swap.active_model().unwrap();
    assert_eq!(model.params[UNET].dtype(), DType::F16);
    assert_eq!(model.params[VAE].dtype(), DType::F32);
}

#[test]
fn stale_selection_falls_back_to_first_checkpoint() {
    let (_root, mut config) = store();
    config.selection.checkpoint = Some("gone.ckpt [pickle] [deadbeef]".to_string());
    let mut swap = HotSwap::builder(config, TensorFactory::default()).build().unwrap();
    swap.setup().unwrap();

    swap.load_model(None).unwrap();
    let loaded: PathBuf = swap.active_record().unwrap().filename().to_path_buf();
    assert_eq!(loaded.file_name().unwrap(), "a.safetensors");
    assert_eq!(swap.selected_title(), Some(swap.active_record().unwrap().title()));
}
