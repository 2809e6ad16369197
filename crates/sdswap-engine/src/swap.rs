//! Load and hot-swap state machine
//!
//! `Unloaded -> Active` via [`HotSwap::load_model`]; `Active -> Active` via
//! [`HotSwap::reload_model_weights`], which either swaps weights in place or falls back
//! to a full rebuild when the architecture changes. Both take `&mut self`, so a second
//! operation cannot start while one is running.

use crate::apply::{LoadReport, apply_lenient};
use crate::collaborators::{
    CheckpointModel, CompanionLoader, ModelFactory, ModelHooks, NoCompanion, NoHooks,
    PostLoadCallback, PrecisionRecorder, SharedPrecision,
};
use crate::fatal::{FatalExit, ProcessExit};
use crate::placement::{DevicePlacement, DirectPlacement};
use sdswap_common::{MemoryStrategy, ModelError, Precision, PrecisionState, Result, SwapConfig};
use sdswap_models::{
    ArchitectureConfig, CheckpointRecord, CheckpointRegistry, CodecRegistry, KeyMigration,
    ModelArchitecture, Resolution, ScanOptions, WeightCache, resolve_architecture,
    resolve_variant,
};
use tracing::{debug, error, info, warn};

/// The live model and what it was built from.
pub struct ActiveModel<M> {
    pub model: M,
    /// Record as loaded, carrying the variant config identity when one applies.
    pub record: CheckpointRecord,
    pub architecture: ModelArchitecture,
    pub precision: PrecisionState,
    pub report: LoadReport,
}

pub enum SwapState<M> {
    Unloaded,
    Active(ActiveModel<M>),
}

impl<M> SwapState<M> {
    pub fn is_active(&self) -> bool {
        matches!(self, SwapState::Active(_))
    }
}

/// What [`HotSwap::reload_model_weights`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Requested file is already active.
    Unchanged,
    /// Weights replaced in the live model.
    Swapped,
    /// Architecture changed; model rebuilt from scratch.
    Rebuilt,
}

pub struct HotSwap<F: ModelFactory> {
    config: SwapConfig,
    registry: CheckpointRegistry,
    selected: Option<String>,
    cache: WeightCache,
    codecs: CodecRegistry,
    migration: KeyMigration,
    factory: F,
    placement: Box<dyn DevicePlacement<F::Model>>,
    hooks: Box<dyn ModelHooks<F::Model>>,
    companion: Box<dyn CompanionLoader<F::Model>>,
    precision: Box<dyn PrecisionRecorder>,
    fatal: Box<dyn FatalExit>,
    callbacks: Vec<PostLoadCallback<F::Model>>,
    state: SwapState<F::Model>,
}

impl<F: ModelFactory> HotSwap<F> {
    pub fn builder(config: SwapConfig, factory: F) -> HotSwapBuilder<F> {
        HotSwapBuilder::new(config, factory)
    }

    // ── Registry ─────────────────────────────────────────────────────────────

    /// Create the models directory if needed and run the initial scan.
    pub fn setup(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.config.storage.models_dir)?;
        self.rescan()
    }

    /// Rebuild the registry from storage. A found preferred artifact becomes the selection.
    pub fn rescan(&mut self) -> Result<()> {
        self.registry = CheckpointRegistry::scan(&ScanOptions::from(&self.config))?;
        if let Some(title) = self.registry.preferred_title() {
            self.selected = Some(title.to_string());
        }
        Ok(())
    }

    pub fn registry(&self) -> &CheckpointRegistry {
        &self.registry
    }

    pub fn list_titles(&self) -> Vec<&str> {
        self.registry.titles_sorted()
    }

    pub fn closest_match(&self, fragment: &str) -> Option<&CheckpointRecord> {
        self.registry.closest_match(fragment)
    }

    pub fn selected_title(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Persist a new selection; takes effect on the next load or reload without a record.
    pub fn select(&mut self, title: impl Into<String>) {
        self.selected = Some(title.into());
    }

    /// Resolve the current selection, adopting the fallback title when it was stale.
    pub fn select_checkpoint(&mut self) -> Result<CheckpointRecord> {
        let resolution = self.registry.resolve_selected(self.selected.as_deref());
        let resolution = self.surface(resolution)?;
        if let Resolution::Fallback { record, .. } = &resolution {
            self.selected = Some(record.title().to_string());
        }
        Ok(resolution.into_record())
    }

    // ── State ────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn state(&self) -> &SwapState<F::Model> {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_active()
    }

    pub fn active(&self) -> Option<&ActiveModel<F::Model>> {
        match &self.state {
            SwapState::Active(active) => Some(active),
            SwapState::Unloaded => None,
        }
    }

    pub fn active_model(&self) -> Option<&F::Model> {
        self.active().map(|a| &a.model)
    }

    pub fn active_record(&self) -> Option<&CheckpointRecord> {
        self.active().map(|a| &a.record)
    }

    pub fn cache(&self) -> &WeightCache {
        &self.cache
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Change the cache bound; zero disables caching and drops every entry.
    pub fn set_cache_bound(&mut self, bound: usize) {
        self.config.cache.checkpoint_cache = bound;
        self.cache.set_bound(bound);
    }

    pub fn on_model_loaded(&mut self, callback: impl FnMut(&F::Model, &CheckpointRecord) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Build a fresh model for `record` (or the current selection), tearing down any
    /// active model first.
    pub fn load_model(&mut self, record: Option<CheckpointRecord>) -> Result<()> {
        let record = match record {
            Some(record) => record,
            None => self.select_checkpoint()?,
        };
        let result = self.load_fresh(record);
        self.surface(result)
    }

    /// Switch the active model to `record` (or the current selection), in place when
    /// the architecture allows it.
    pub fn reload_model_weights(&mut self, record: Option<CheckpointRecord>) -> Result<ReloadOutcome> {
        let record = match record {
            Some(record) => record,
            None => self.select_checkpoint()?,
        };
        let result = self.reload(record);
        self.surface(result)
    }

    fn load_fresh(&mut self, record: CheckpointRecord) -> Result<()> {
        self.teardown();

        if record.config_path() != self.config.storage.fallback_config {
            info!("Loading config from: {}", record.config_path().display());
        }
        let base = ArchitectureConfig::load(record.config_path())?;
        let (resolved, architecture) = resolve_architecture(&record, base)?;

        self.hooks.prepare(&architecture)?;
        let mut model = self.factory.instantiate(&architecture)?;
        model.set_eval();

        let (report, precision) = self.apply_weights(&mut model, &resolved)?;

        self.placement.place(&mut model, self.config.memory_strategy())?;
        self.hooks.install(&mut model)?;

        self.state = SwapState::Active(ActiveModel {
            model,
            record: resolved,
            architecture,
            precision,
            report,
        });
        self.notify();
        info!("Model loaded.");
        Ok(())
    }

    fn reload(&mut self, record: CheckpointRecord) -> Result<ReloadOutcome> {
        let SwapState::Active(active) = &self.state else {
            return Err(ModelError::NotLoaded.into());
        };

        if active.record.filename() == record.filename() {
            debug!("{} is already active", record.title());
            return Ok(ReloadOutcome::Unchanged);
        }

        let (resolved, variant) = resolve_variant(&record);
        let identity = active.architecture.config_identity();
        if resolved.config_path() != identity || variant != active.architecture.is_variant() {
            info!(
                "Architecture changes from {} to {}; rebuilding model",
                identity.display(),
                resolved.config_path().display()
            );
            self.cache.clear();
            self.load_fresh(record)?;
            return Ok(ReloadOutcome::Rebuilt);
        }

        let SwapState::Active(mut active) = std::mem::replace(&mut self.state, SwapState::Unloaded)
        else {
            return Err(ModelError::NotLoaded.into());
        };

        let strategy = self.config.memory_strategy();
        let swapped = self.swap_in_place(&mut active, &resolved, strategy);
        if let Err(e) = swapped {
            error!("Weight swap to {} failed; model unloaded: {}", resolved.title(), e);
            drop(active);
            self.placement.reclaim_memory();
            return Err(e);
        }

        active.record = resolved;
        self.state = SwapState::Active(active);
        self.notify();

        if !strategy.is_low_memory()
            && let SwapState::Active(active) = &mut self.state
            && let Err(e) = self.placement.restore(&mut active.model)
        {
            error!("Restoring model to its device failed; model unloaded: {}", e);
            self.teardown();
            return Err(e);
        }

        info!("Weights loaded.");
        Ok(ReloadOutcome::Swapped)
    }

    fn swap_in_place(
        &mut self,
        active: &mut ActiveModel<F::Model>,
        resolved: &CheckpointRecord,
        strategy: MemoryStrategy,
    ) -> Result<()> {
        self.placement.park(&mut active.model, strategy)?;
        self.hooks.uninstall(&mut active.model);
        let (report, precision) = self.apply_weights(&mut active.model, resolved)?;
        active.report = report;
        active.precision = precision;
        self.hooks.install(&mut active.model)
    }

    /// Cache or file, then cache bound, model and companion precision, companion artifact.
    fn apply_weights(
        &mut self,
        model: &mut F::Model,
        record: &CheckpointRecord,
    ) -> Result<(LoadReport, PrecisionState)> {
        let report = if let Some(cached) = self.cache.get(record) {
            info!("Loading weights [{}] from cache", record.fingerprint());
            apply_lenient(model, cached)?
        } else {
            info!("Loading weights [{}] from {}", record.fingerprint(), record.filename().display());
            let payload = self.codecs.read(
                record.filename(),
                record.format(),
                self.config.placement.weight_load_location,
            )?;
            let weights = self.migration.normalize(payload);
            let report = apply_lenient(model, &weights)?;
            self.cache.put(record.clone(), &weights)?;
            report
        };

        if self.cache.is_enabled() {
            self.cache.evict_to_bound(self.cache.bound());
        }

        let precision = PrecisionState::from_flags(
            self.config.precision.full_precision,
            self.config.precision.vae_full_precision,
        );
        if precision.model == Precision::Half {
            let detached =
                if self.config.precision.vae_full_precision { model.take_companion() } else { None };
            let converted = model.convert_precision(Precision::Half);
            if let Some(companion) = detached {
                model.restore_companion(companion);
            }
            converted?;
        }
        model.convert_companion_precision(precision.companion)?;
        self.precision.record(precision);

        let vae = self.companion.resolve(record.filename(), &self.config.selection.vae);
        self.companion.load(model, vae.as_deref())?;

        Ok((report, precision))
    }

    fn teardown(&mut self) {
        if let SwapState::Active(mut active) = std::mem::replace(&mut self.state, SwapState::Unloaded) {
            debug!("Unloading {}", active.record.title());
            self.hooks.uninstall(&mut active.model);
            drop(active);
            self.placement.reclaim_memory();
        }
    }

    fn notify(&mut self) {
        if let SwapState::Active(active) = &self.state {
            for callback in &mut self.callbacks {
                callback(&active.model, &active.record);
            }
        }
    }

    /// Route fatal errors to the termination channel before returning them.
    fn surface<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.fatal.terminate(e);
            } else {
                warn!("{}", e);
            }
        }
        result
    }
}

pub struct HotSwapBuilder<F: ModelFactory> {
    config: SwapConfig,
    factory: F,
    codecs: Option<CodecRegistry>,
    migration: KeyMigration,
    placement: Option<Box<dyn DevicePlacement<F::Model>>>,
    hooks: Box<dyn ModelHooks<F::Model>>,
    companion: Box<dyn CompanionLoader<F::Model>>,
    precision: Box<dyn PrecisionRecorder>,
    fatal: Box<dyn FatalExit>,
    callbacks: Vec<PostLoadCallback<F::Model>>,
}

impl<F: ModelFactory> HotSwapBuilder<F> {
    pub fn new(config: SwapConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            codecs: None,
            migration: KeyMigration::default(),
            placement: None,
            hooks: Box::new(NoHooks),
            companion: Box::new(NoCompanion),
            precision: Box::new(SharedPrecision::new()),
            fatal: Box::new(ProcessExit),
            callbacks: Vec::new(),
        }
    }

    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = Some(codecs);
        self
    }

    pub fn migration(mut self, migration: KeyMigration) -> Self {
        self.migration = migration;
        self
    }

    pub fn placement(mut self, placement: impl DevicePlacement<F::Model> + 'static) -> Self {
        self.placement = Some(Box::new(placement));
        self
    }

    pub fn hooks(mut self, hooks: impl ModelHooks<F::Model> + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn companion(mut self, companion: impl CompanionLoader<F::Model> + 'static) -> Self {
        self.companion = Box::new(companion);
        self
    }

    pub fn precision_recorder(mut self, recorder: impl PrecisionRecorder + 'static) -> Self {
        self.precision = Box::new(recorder);
        self
    }

    pub fn fatal_exit(mut self, fatal: impl FatalExit + 'static) -> Self {
        self.fatal = Box::new(fatal);
        self
    }

    pub fn on_model_loaded(
        mut self,
        callback: impl FnMut(&F::Model, &CheckpointRecord) + 'static,
    ) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<HotSwap<F>> {
        self.config.validate()?;
        let codecs = self.codecs.unwrap_or_else(|| CodecRegistry::with_defaults(&self.config));
        let placement = self
            .placement
            .unwrap_or_else(|| -> Box<dyn DevicePlacement<F::Model>> {
                Box::new(DirectPlacement::new(self.config.placement.device))
            });

        Ok(HotSwap {
            cache: WeightCache::new(self.config.cache.checkpoint_cache),
            selected: self.config.selection.checkpoint.clone(),
            registry: CheckpointRegistry::new(),
            config: self.config,
            codecs,
            migration: self.migration,
            factory: self.factory,
            placement,
            hooks: self.hooks,
            companion: self.companion,
            precision: self.precision,
            fatal: self.fatal,
            callbacks: self.callbacks,
            state: SwapState::Unloaded,
        })
    }
}
